use axum::{Router, http::HeaderMap, response::Json, routing::get};
use get_real_ip::{Config, RealIp, RealIpLayer};
use serde_json::json;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const CONFIG: &str = r#"{
    "proxy": [
        { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "1", "realIP": "X-Forwarded-For", "overwriteXFF": true },
        { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "2", "realIP": "Client-Ip" }
    ],
    "enableLog": true,
    "deny403OnFail": true,
    "eraseProxyHeaders": true
}"#;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config: Config = serde_json::from_str(CONFIG).unwrap();
    let app = Router::new()
        .route("/ip", get(ip_handler))
        .layer(RealIpLayer::from_config(&config).unwrap());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();

    println!("Server starting on http://localhost:3000");
    println!("Test with headers:");
    println!("  curl -H 'X-From-Cdn: 1' -H 'X-Forwarded-For: junk, 203.0.113.42, 10.0.0.1' http://localhost:3000/ip");
    println!("  curl -H 'X-From-Cdn: 2' -H 'Client-Ip: 198.51.100.7' http://localhost:3000/ip");
    println!("  curl -i http://localhost:3000/ip   # 403, no rule matches");
    println!();

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

/// Shows what the downstream handler sees after resolution
async fn ip_handler(real_ip: Option<RealIp>, headers: HeaderMap) -> Json<serde_json::Value> {
    Json(json!({
        "real_ip": real_ip.map(|ip| ip.ip().to_string()),
        "headers": headers.iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.to_string(), v.to_string()))
            })
            .collect::<std::collections::HashMap<String, String>>(),
    }))
}
