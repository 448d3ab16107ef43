/* src/resolver.rs */

use std::net::IpAddr;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::{Config, IpSource, ProxyMatch, ResolverConfig, TrustRule};
use crate::error::Result;
use crate::extractor::{header_value, parse_ip, raw_candidate, split_candidates};

/// Canonical client IP header written on resolution.
pub const X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Forwarding chain header.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Tracing target for every diagnostic line.
pub const LOG_TARGET: &str = "get_realip";

/// Emit a diagnostic line when `$enabled` is set.
macro_rules! diag {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            tracing::info!(target: LOG_TARGET, $($arg)+);
        }
    };
}

/// What the caller should do with the request after resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Hand the request downstream, with the resolved IP if any.
    Forward(Option<IpAddr>),
    /// Reject with 403 without calling downstream.
    Deny,
}

impl Decision {
    pub fn is_denied(&self) -> bool {
        matches!(self, Decision::Deny)
    }

    pub fn real_ip(&self) -> Option<IpAddr> {
        match self {
            Decision::Forward(ip) => *ip,
            Decision::Deny => None,
        }
    }
}

/// Applies trust rules to requests.
///
/// Built once and shared read-only across requests.
///
/// ```rust
/// use get_real_ip::{Decision, IpSource, Resolver, ResolverConfig, TrustRule};
/// use http::HeaderMap;
///
/// let resolver = Resolver::new(
///     ResolverConfig::new().with_rule(TrustRule::any(IpSource::RemoteAddr)),
/// );
///
/// let mut headers = HeaderMap::new();
/// let decision = resolver.resolve(&mut headers, "172.18.0.5:55122");
///
/// assert_eq!(decision, Decision::Forward(Some("172.18.0.5".parse().unwrap())));
/// assert_eq!(headers["x-real-ip"], "172.18.0.5");
/// ```
#[derive(Debug, Clone)]
pub struct Resolver {
    config: ResolverConfig,
}

impl Resolver {
    pub fn new(config: ResolverConfig) -> Self {
        tracing::info!(
            target: LOG_TARGET,
            rules = config.rules.len(),
            "Instance created with {} proxy configurations",
            config.rules.len()
        );
        Self { config }
    }

    /// Validate a decoded configuration document and build a resolver.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(ResolverConfig::try_from(config)?))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve the client IP for one request, mutating its headers.
    ///
    /// `remote_addr` is the connection's socket address in `host:port` form.
    pub fn resolve(&self, headers: &mut HeaderMap, remote_addr: &str) -> Decision {
        let log = self.config.enable_log;
        let mut matched: Option<&TrustRule> = None;
        let mut real_ip = None;

        for rule in &self.config.rules {
            if !proxy_matches(&rule.proxy, headers) {
                continue;
            }
            matched = Some(rule);
            diag!(log, "Processing proxy configuration: {}", describe(&rule.proxy));

            // a matched rule without a usable IP falls through to the next rule
            if let Some(ip) = first_valid_ip(rule, headers, remote_addr, log) {
                set_real_ip(rule, ip, headers, log);
                real_ip = Some(ip);
                break;
            }
        }

        if self.config.deny_on_no_match && matched.is_none() && !self.config.rules.is_empty() {
            diag!(log, "No matching proxy configuration found, returning 403");
            return Decision::Deny;
        }

        if self.config.erase_trust_headers {
            if let Some(rule) = matched {
                erase_headers(rule, headers, log);
            }
        }

        Decision::Forward(real_ip)
    }
}

fn proxy_matches(proxy: &ProxyMatch, headers: &HeaderMap) -> bool {
    match proxy {
        ProxyMatch::Any => true,
        ProxyMatch::Header { name, value } => header_value(headers, name) == value.as_str(),
    }
}

fn describe(proxy: &ProxyMatch) -> String {
    match proxy {
        ProxyMatch::Any => "* (any request)".to_string(),
        ProxyMatch::Header { name, value } => format!("{value} ({name})"),
    }
}

fn first_valid_ip(
    rule: &TrustRule,
    headers: &HeaderMap,
    remote_addr: &str,
    log: bool,
) -> Option<IpAddr> {
    let raw = raw_candidate(headers, &rule.source, remote_addr);
    let tokens = split_candidates(&raw);
    diag!(log, "Processing IP addresses: {:?} ({} found)", tokens, tokens.len());

    for (index, token) in tokens.iter().enumerate() {
        let parsed = parse_ip(token);
        diag!(
            log,
            "Validating IP: {} (index: {}, parsed: {:?})",
            token.trim(),
            index,
            parsed
        );
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

fn set_real_ip(rule: &TrustRule, ip: IpAddr, headers: &mut HeaderMap, log: bool) {
    // the text form of an address is always a valid header value
    let Ok(value) = HeaderValue::from_str(&ip.to_string()) else {
        return;
    };

    if rule.overwrite_forwarded_for {
        diag!(log, "Overwriting X-Forwarded-For header with: {}", ip);
        headers.insert(X_FORWARDED_FOR, value.clone());
    }
    headers.insert(X_REAL_IP, value);
}

fn erase_headers(rule: &TrustRule, headers: &mut HeaderMap, log: bool) {
    diag!(log, "Erasing proxy headers");

    if let ProxyMatch::Header { name, .. } = &rule.proxy {
        headers.remove(name);
        diag!(log, "Erased header: {}", name);
    }

    // X-Forwarded-For may still be needed further down the pipeline
    if let IpSource::Header(name) = &rule.source {
        if *name != X_FORWARDED_FOR {
            headers.remove(name);
            diag!(log, "Erased header: {}", name);
        }
    }
}
