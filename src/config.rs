/* src/config.rs */

use http::HeaderName;
use serde::Deserialize;

use crate::error::{RealIpError, Result};

/// Proxy header name that makes a rule match every request.
pub const WILDCARD: &str = "*";

/// `realIP` value that selects the connection's socket address.
pub const REMOTE_ADDR: &str = "RemoteAddr";

/// One trust rule as it appears in a configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Header identifying the trusted proxy, or `"*"`.
    #[serde(rename = "proxyHeadername", alias = "proxyHeaderName")]
    pub proxy_header_name: String,

    /// Expected value of `proxy_header_name`.
    #[serde(rename = "proxyHeadervalue", alias = "proxyHeaderValue")]
    pub proxy_header_value: String,

    /// Header carrying the client IP, or `"RemoteAddr"`.
    #[serde(rename = "realIP")]
    pub real_ip: String,

    /// Replace `X-Forwarded-For` with the resolved IP.
    #[serde(rename = "overwriteXFF")]
    pub overwrite_xff: bool,
}

/// Decoded configuration document.
///
/// ```rust
/// use get_real_ip::Config;
///
/// let config: Config = serde_json::from_str(r#"{
///     "proxy": [
///         { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "edge", "realIP": "Cf-Connecting-Ip" }
///     ],
///     "deny403OnFail": true
/// }"#).unwrap();
///
/// assert_eq!(config.proxy.len(), 1);
/// assert!(config.deny_403_on_fail);
/// assert!(!config.enable_log);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ordered trust rules.
    #[serde(rename = "proxy", alias = "rules")]
    pub proxy: Vec<ProxyConfig>,

    #[serde(rename = "enableLog")]
    pub enable_log: bool,

    #[serde(rename = "deny403OnFail")]
    pub deny_403_on_fail: bool,

    #[serde(rename = "eraseProxyHeaders")]
    pub erase_proxy_headers: bool,
}

/// How a rule recognises the proxy a request came through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMatch {
    /// Matches every request.
    Any,
    /// Matches when the header's first value equals `value` exactly.
    Header { name: HeaderName, value: String },
}

/// Where a rule reads the client IP from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpSource {
    /// A (possibly comma separated) request header.
    Header(HeaderName),
    /// The connection's socket address.
    RemoteAddr,
}

/// A validated trust rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustRule {
    pub proxy: ProxyMatch,
    pub source: IpSource,
    pub overwrite_forwarded_for: bool,
}

impl TrustRule {
    /// Rule that applies to every request.
    pub fn any(source: IpSource) -> Self {
        Self {
            proxy: ProxyMatch::Any,
            source,
            overwrite_forwarded_for: false,
        }
    }

    /// Rule that applies when `name` carries exactly `value`.
    pub fn header(name: HeaderName, value: impl Into<String>, source: IpSource) -> Self {
        Self {
            proxy: ProxyMatch::Header {
                name,
                value: value.into(),
            },
            source,
            overwrite_forwarded_for: false,
        }
    }

    /// Set whether the resolved IP replaces `X-Forwarded-For`.
    pub fn overwrite_forwarded_for(mut self, overwrite: bool) -> Self {
        self.overwrite_forwarded_for = overwrite;
        self
    }
}

impl TryFrom<&ProxyConfig> for TrustRule {
    type Error = RealIpError;

    fn try_from(raw: &ProxyConfig) -> Result<Self> {
        let proxy = if raw.proxy_header_name == WILDCARD {
            ProxyMatch::Any
        } else {
            ProxyMatch::Header {
                name: header_name("proxyHeadername", &raw.proxy_header_name)?,
                value: raw.proxy_header_value.clone(),
            }
        };

        let source = if raw.real_ip == REMOTE_ADDR {
            IpSource::RemoteAddr
        } else {
            IpSource::Header(header_name("realIP", &raw.real_ip)?)
        };

        Ok(Self {
            proxy,
            source,
            overwrite_forwarded_for: raw.overwrite_xff,
        })
    }
}

fn header_name(field: &'static str, name: &str) -> Result<HeaderName> {
    if name.is_empty() {
        return Err(RealIpError::EmptyHeaderName { field });
    }
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| RealIpError::InvalidHeaderName {
        field,
        name: name.to_string(),
    })
}

/// Immutable resolver settings, shared by every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Trust rules; the first one that matches and yields an IP wins.
    pub rules: Vec<TrustRule>,
    /// Emit per-request diagnostic lines.
    pub enable_log: bool,
    /// Reject requests that match no rule with 403.
    pub deny_on_no_match: bool,
    /// Remove the matched rule's headers once processed.
    pub erase_trust_headers: bool,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule.
    pub fn with_rule(mut self, rule: TrustRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replace all rules.
    pub fn with_rules(mut self, rules: Vec<TrustRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn enable_log(mut self, enable: bool) -> Self {
        self.enable_log = enable;
        self
    }

    pub fn deny_on_no_match(mut self, deny: bool) -> Self {
        self.deny_on_no_match = deny;
        self
    }

    pub fn erase_trust_headers(mut self, erase: bool) -> Self {
        self.erase_trust_headers = erase;
        self
    }
}

impl TryFrom<&Config> for ResolverConfig {
    type Error = RealIpError;

    fn try_from(config: &Config) -> Result<Self> {
        let rules = config
            .proxy
            .iter()
            .map(TrustRule::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            enable_log: config.enable_log,
            deny_on_no_match: config.deny_403_on_fail,
            erase_trust_headers: config.erase_proxy_headers,
        })
    }
}

impl TryFrom<Config> for ResolverConfig {
    type Error = RealIpError;

    fn try_from(config: Config) -> Result<Self> {
        Self::try_from(&config)
    }
}
