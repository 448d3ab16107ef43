/* src/middleware.rs */

use axum::{
    extract::{ConnectInfo, FromRequestParts, OptionalFromRequestParts, Request},
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use futures_util::future::BoxFuture;
use std::{
    convert::Infallible,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::config::Config;
use crate::error::Result;
use crate::resolver::{Decision, Resolver};

/// Extension that holds the resolved client IP address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealIp(pub IpAddr);

impl RealIp {
    /// Get the IP address.
    pub fn ip(&self) -> IpAddr {
        self.0
    }
}

/// Layer that runs a [`Resolver`] in front of the wrapped service.
///
/// Headers are rewritten before the inner service sees the request, the
/// resolved address is stored as a [`RealIp`] extension, and requests denied
/// by policy are answered with `403 Forbidden` without reaching the inner
/// service. The connection address comes from `ConnectInfo<SocketAddr>`.
///
/// # Examples
///
/// ```rust,no_run
/// use axum::{Router, routing::get};
/// use get_real_ip::{IpSource, RealIp, RealIpLayer, Resolver, ResolverConfig, TrustRule};
///
/// async fn handler(RealIp(ip): RealIp) -> String {
///     ip.to_string()
/// }
///
/// let resolver = Resolver::new(
///     ResolverConfig::new().with_rule(TrustRule::any(IpSource::RemoteAddr)),
/// );
/// let app: Router = Router::new()
///     .route("/", get(handler))
///     .layer(RealIpLayer::new(resolver));
/// ```
#[derive(Debug, Clone)]
pub struct RealIpLayer {
    resolver: Arc<Resolver>,
}

impl RealIpLayer {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Build the layer straight from a decoded configuration document.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(Resolver::from_config(config)?))
    }
}

impl<S> Layer<S> for RealIpLayer {
    type Service = RealIpService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RealIpService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

/// Service that resolves client IPs.
#[derive(Debug, Clone)]
pub struct RealIpService<S> {
    inner: S,
    resolver: Arc<Resolver>,
}

impl<S> Service<Request> for RealIpService<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let remote_addr = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();

        match self.resolver.resolve(req.headers_mut(), &remote_addr) {
            Decision::Deny => Box::pin(async { Ok(StatusCode::FORBIDDEN.into_response()) }),
            Decision::Forward(real_ip) => {
                if let Some(ip) = real_ip {
                    req.extensions_mut().insert(RealIp(ip));
                }
                let future = self.inner.call(req);
                Box::pin(future)
            }
        }
    }
}

/// Axum extractor for the resolved client IP.
///
/// Falls back to the connection address when no rule resolved an IP.
impl<S> FromRequestParts<S> for RealIp
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(real_ip) = parts.extensions.get::<RealIp>() {
            return Ok(*real_ip);
        }
        parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| RealIp(addr.ip()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// `Option<RealIp>` is `Some` only when a rule resolved an IP.
impl<S> OptionalFromRequestParts<S> for RealIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<RealIp>().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IpSource, ResolverConfig, TrustRule};
    use axum::{Router, body::Body, http::HeaderMap, http::HeaderName, routing::get};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    async fn echo(real_ip: Option<RealIp>, headers: HeaderMap) -> String {
        let resolved = real_ip
            .map(|RealIp(ip)| ip.to_string())
            .unwrap_or_default();
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        format!("{resolved}|{forwarded}")
    }

    fn app(config: ResolverConfig) -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(RealIpLayer::new(Resolver::new(config)))
    }

    fn request(remote: &str, headers: &[(&'static str, &'static str)]) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(remote.parse::<SocketAddr>().unwrap()));
        req
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn cdn_rule(value: &str) -> TrustRule {
        TrustRule::header(
            HeaderName::from_static("x-from-cdn"),
            value,
            IpSource::Header(HeaderName::from_static("x-forwarded-for")),
        )
    }

    #[tokio::test]
    async fn test_socket_address_fallback() {
        let config = ResolverConfig::new().with_rule(TrustRule::any(IpSource::RemoteAddr));

        let response = app(config)
            .oneshot(request("172.18.0.5:55122", &[]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "172.18.0.5|");
    }

    #[tokio::test]
    async fn test_overwrite_visible_downstream() {
        let config = ResolverConfig::new().with_rule(cdn_rule("1").overwrite_forwarded_for(true));

        let response = app(config)
            .oneshot(request(
                "192.0.2.1:4000",
                &[("x-from-cdn", "1"), ("x-forwarded-for", "10.0.0.1, 172.16.0.1")],
            ))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "10.0.0.1|10.0.0.1");
    }

    #[tokio::test]
    async fn test_denied_request_skips_handler() {
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        let app = Router::new()
            .route(
                "/",
                get(move || {
                    let flag = flag.clone();
                    async move {
                        flag.store(true, Ordering::SeqCst);
                        "reached"
                    }
                }),
            )
            .layer(RealIpLayer::new(Resolver::new(
                ResolverConfig::new()
                    .with_rule(cdn_rule("1"))
                    .deny_on_no_match(true),
            )));

        let response = app
            .oneshot(request("192.0.2.1:4000", &[("x-from-cdn", "2")]))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(body_string(response).await.is_empty());
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_matched_without_ip_passes_through() {
        let config = ResolverConfig::new()
            .with_rule(cdn_rule("1"))
            .deny_on_no_match(true);

        let response = app(config)
            .oneshot(request(
                "192.0.2.1:4000",
                &[("x-from-cdn", "1"), ("x-forwarded-for", "unknown")],
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "|unknown");
    }

    #[tokio::test]
    async fn test_extractor_falls_back_to_connection() {
        let app = Router::new()
            .route("/", get(|RealIp(ip): RealIp| async move { ip.to_string() }))
            .layer(RealIpLayer::new(Resolver::new(ResolverConfig::new())));

        let response = app.oneshot(request("198.51.100.7:999", &[])).await.unwrap();
        assert_eq!(body_string(response).await, "198.51.100.7");
    }

    #[tokio::test]
    async fn test_layer_from_config() {
        let config: Config = serde_json::from_str(
            r#"{ "proxy": [ { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "1", "realIP": "Client-Ip" } ] }"#,
        )
        .unwrap();
        let app = Router::new()
            .route("/", get(echo))
            .layer(RealIpLayer::from_config(&config).unwrap());

        let response = app
            .oneshot(request(
                "192.0.2.1:4000",
                &[("x-from-cdn", "1"), ("client-ip", "10.0.1.1")],
            ))
            .await
            .unwrap();

        assert_eq!(body_string(response).await, "10.0.1.1|");
    }
}
