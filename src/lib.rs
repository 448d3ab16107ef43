/* src/lib.rs */
//! # Get Real IP
//!
//! Rule-based resolution of the real client IP address for HTTP requests that
//! pass through trusted reverse proxies or CDNs.
//!
//! Each [`TrustRule`] says how to recognise a proxy (a header carrying an
//! exact value, or `*` for any request) and where that proxy puts the client
//! address (a header, or the connection's socket address). Rules are tried in
//! order; the first rule that matches *and* yields a valid IP wins.
//!
//! ## Features
//!
//! - First-match rule evaluation with fall-through on unusable candidates
//! - Comma separated chains, `:port` suffixes and bracketed IPv6 handled
//! - Writes `X-Real-Ip`, optionally replaces `X-Forwarded-For`
//! - Optional erasure of proxy headers and 403 on requests matching no rule
//! - Optional Axum middleware and extractor integration via the `axum` feature
//!
//! ## Examples
//!
//! ### Basic Usage
//!
//! ```rust
//! use get_real_ip::{Config, Decision, Resolver};
//! use http::HeaderMap;
//!
//! let config: Config = serde_json::from_str(r#"{
//!     "proxy": [
//!         { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "1", "realIP": "X-Forwarded-For" },
//!         { "proxyHeadername": "*", "realIP": "RemoteAddr" }
//!     ]
//! }"#).unwrap();
//! let resolver = Resolver::from_config(&config).unwrap();
//!
//! let mut headers = HeaderMap::new();
//! headers.insert("x-from-cdn", "1".parse().unwrap());
//! headers.insert("x-forwarded-for", "unknown, 203.0.113.9, 10.0.0.1".parse().unwrap());
//!
//! let decision = resolver.resolve(&mut headers, "172.18.0.1:4000");
//! assert_eq!(decision, Decision::Forward(Some("203.0.113.9".parse().unwrap())));
//! assert_eq!(headers["x-real-ip"], "203.0.113.9");
//! ```

pub mod config;
pub mod error;
pub mod extractor;
pub mod resolver;

#[cfg(feature = "axum")]
pub mod middleware;

pub use config::{Config, IpSource, ProxyConfig, ProxyMatch, ResolverConfig, TrustRule};
pub use error::{RealIpError, Result};
pub use extractor::parse_ip;
pub use resolver::{Decision, Resolver, X_FORWARDED_FOR, X_REAL_IP};

#[cfg(feature = "axum")]
pub use middleware::{RealIp, RealIpLayer, RealIpService};

/// Re-export commonly used types
pub use std::net::IpAddr;
