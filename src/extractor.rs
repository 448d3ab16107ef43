/* src/extractor.rs */

use std::borrow::Cow;
use std::net::IpAddr;

use http::{HeaderMap, HeaderName};

use crate::config::IpSource;

/// First value of `name`, or the empty string when absent.
///
/// Bytes that are not valid UTF-8 are replaced rather than rejected, so a
/// header carrying garbage still yields tokens that simply fail to parse.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Cow<'a, str> {
    match headers.get(name) {
        Some(value) => String::from_utf8_lossy(value.as_bytes()),
        None => Cow::Borrowed(""),
    }
}

/// Raw candidate string for a rule's IP source.
pub fn raw_candidate<'a>(
    headers: &'a HeaderMap,
    source: &IpSource,
    remote_addr: &'a str,
) -> Cow<'a, str> {
    match source {
        IpSource::RemoteAddr => Cow::Borrowed(remote_addr),
        IpSource::Header(name) => header_value(headers, name),
    }
}

/// Split a candidate into its comma separated tokens, order preserved.
///
/// ```rust
/// use get_real_ip::extractor::split_candidates;
///
/// assert_eq!(split_candidates("a, b,c"), vec!["a", " b", "c"]);
/// assert_eq!(split_candidates(""), vec![""]);
/// ```
pub fn split_candidates(raw: &str) -> Vec<&str> {
    raw.split(',').collect()
}

/// Host part of a `host:port` pair.
///
/// Accepts `v4:port`, `name:port` and `[v6]:port`. Returns `None` when there
/// is no port, or when an unbracketed host still contains a colon (a bare
/// IPv6 address).
pub fn split_host_port(hostport: &str) -> Option<&str> {
    if let Some(rest) = hostport.strip_prefix('[') {
        let end = rest.find(']')?;
        let port = rest[end + 1..].strip_prefix(':')?;
        if port.contains(':') {
            return None;
        }
        return Some(&rest[..end]);
    }

    let (host, _port) = hostport.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some(host)
}

/// Normalize one token into an IP address.
///
/// Surrounding whitespace and an optional `:port` suffix are dropped.
/// IPv4-mapped IPv6 addresses come back as plain IPv4.
///
/// ```rust
/// use get_real_ip::extractor::parse_ip;
///
/// assert_eq!(parse_ip(" 10.0.3.1:2345 "), Some("10.0.3.1".parse().unwrap()));
/// assert_eq!(parse_ip("[2001:db8::1]:443"), Some("2001:db8::1".parse().unwrap()));
/// assert_eq!(parse_ip("unknown"), None);
/// ```
pub fn parse_ip(token: &str) -> Option<IpAddr> {
    let token = token.trim();
    let host = split_host_port(token).unwrap_or(token);
    host.parse::<IpAddr>().ok().map(|ip| ip.to_canonical())
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("172.18.0.5:55122"), Some("172.18.0.5"));
        assert_eq!(split_host_port("[::1]:80"), Some("::1"));
        assert_eq!(split_host_port("example.com:80"), Some("example.com"));
        assert_eq!(split_host_port("10.0.0.1:"), Some("10.0.0.1"));
        assert_eq!(split_host_port("10.0.0.1"), None);
        assert_eq!(split_host_port("2001:db8::1"), None);
        assert_eq!(split_host_port("[::1]"), None);
        assert_eq!(split_host_port("[::1]:80:90"), None);
    }

    #[test]
    fn test_parse_ip_port_stripping() {
        assert_eq!(parse_ip("10.0.3.1:2345"), Some("10.0.3.1".parse().unwrap()));
        assert_eq!(parse_ip("  10.0.0.1\t"), Some("10.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_parse_ip_v6() {
        assert_eq!(parse_ip("2001:db8::1"), Some("2001:db8::1".parse().unwrap()));
        assert_eq!(parse_ip("[::1]:8080"), Some("::1".parse().unwrap()));
        // bracketed without a port is not an address
        assert_eq!(parse_ip("[::1]"), None);
    }

    #[test]
    fn test_parse_ip_mapped_v4_is_canonical() {
        let ip = parse_ip("::ffff:192.0.2.7").unwrap();
        assert_eq!(ip.to_string(), "192.0.2.7");
    }

    #[test]
    fn test_parse_ip_garbage() {
        assert_eq!(parse_ip(""), None);
        assert_eq!(parse_ip("stuff🤣"), None);
        assert_eq!(parse_ip("sss"), None);
        assert_eq!(parse_ip("256.0.0.1"), None);
    }

    #[test]
    fn test_split_candidates_keeps_order_and_duplicates() {
        assert_eq!(
            split_candidates("1.1.1.1,1.1.1.1, 2.2.2.2"),
            vec!["1.1.1.1", "1.1.1.1", " 2.2.2.2"]
        );
        assert_eq!(split_candidates("10.0.0.1"), vec!["10.0.0.1"]);
    }

    #[test]
    fn test_raw_candidate() {
        let mut headers = HeaderMap::new();
        headers.insert("client-ip", HeaderValue::from_static("10.0.1.1"));

        let from_header = IpSource::Header(HeaderName::from_static("client-ip"));
        let missing = IpSource::Header(HeaderName::from_static("cf-connecting-ip"));

        assert_eq!(raw_candidate(&headers, &from_header, "1.2.3.4:5"), "10.0.1.1");
        assert_eq!(raw_candidate(&headers, &missing, "1.2.3.4:5"), "");
        assert_eq!(
            raw_candidate(&headers, &IpSource::RemoteAddr, "1.2.3.4:5"),
            "1.2.3.4:5"
        );
    }

    #[test]
    fn test_header_value_lossy() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_bytes("junk🤣, 10.0.0.1".as_bytes()).unwrap(),
        );

        let value = header_value(&headers, &HeaderName::from_static("x-forwarded-for"));
        assert_eq!(value, "junk🤣, 10.0.0.1");
    }
}
