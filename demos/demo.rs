use get_real_ip::{Config, Decision, Resolver};
use http::HeaderMap;

const CONFIG: &str = r#"{
    "proxy": [
        { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "edge-1", "realIP": "X-Forwarded-For", "overwriteXFF": true },
        { "proxyHeadername": "X-From-Cdn", "proxyHeadervalue": "edge-2", "realIP": "Cf-Connecting-Ip" },
        { "proxyHeadername": "*", "realIP": "RemoteAddr" }
    ],
    "enableLog": true,
    "eraseProxyHeaders": true
}"#;

fn main() {
    tracing_subscriber::fmt().with_target(true).init();

    println!("=== Real IP Resolution Examples ===\n");

    let config: Config = match serde_json::from_str(CONFIG) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {}", err);
            return;
        }
    };
    let resolver = match Resolver::from_config(&config) {
        Ok(resolver) => resolver,
        Err(err) => {
            eprintln!("Invalid rule: {}", err);
            return;
        }
    };

    // Example 1: chain with garbage in front
    run(
        &resolver,
        "Forwarding chain with junk entries",
        &[("x-from-cdn", "edge-1"), ("x-forwarded-for", "unknown, 10.0.3.1:2345, 2.2.2.2")],
        "172.18.0.4:4000",
    );

    // Example 2: dedicated header, erased afterwards
    run(
        &resolver,
        "CDN specific header",
        &[("x-from-cdn", "edge-2"), ("cf-connecting-ip", "198.51.100.42")],
        "172.18.0.3:3000",
    );

    // Example 3: unknown proxy falls back to the socket address
    run(
        &resolver,
        "Socket address fallback",
        &[("x-from-cdn", "somebody-else")],
        "172.18.0.5:55122",
    );

    println!("=== All examples completed! ===");
}

fn run(resolver: &Resolver, title: &str, pairs: &[(&'static str, &str)], remote_addr: &str) {
    println!("Example: {}", title);

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        if let Ok(value) = value.parse() {
            headers.insert(*name, value);
        }
    }

    match resolver.resolve(&mut headers, remote_addr) {
        Decision::Forward(Some(ip)) => println!("Resolved IP: {}", ip),
        Decision::Forward(None) => println!("No IP resolved"),
        Decision::Deny => println!("Denied with 403"),
    }

    println!("Headers after resolution:");
    for (name, value) in &headers {
        println!("  {}: {:?}", name, value);
    }
    println!();
}
