//! Shared utilities for integration testing.

use std::net::SocketAddr;

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use http_sanitizer::config::GatewayConfig;
use http_sanitizer::http::HttpServer;
use http_sanitizer::lifecycle::Shutdown;
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Start a mock upstream that echoes what it received as JSON:
/// `{"method", "uri", "headers": {name: [values]}, "body"}`.
///
/// Every response also carries `server: mock-upstream` and `x-internal: secret`.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

async fn echo(request: Request<Body>) -> Response<Body> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, usize::MAX).await.unwrap_or_default();

    let mut headers = Map::new();
    for (name, value) in parts.headers.iter() {
        let entry = headers
            .entry(name.as_str().to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = entry {
            values.push(Value::String(String::from_utf8_lossy(value.as_bytes()).into_owned()));
        }
    }

    let payload = json!({
        "method": parts.method.as_str(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body),
    });

    Response::builder()
        .header("server", "mock-upstream")
        .header("x-internal", "secret")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

/// A running gateway under test.
pub struct Gateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Parse a config document and point it at `upstream`.
pub fn config_for(upstream: SocketAddr, toml: &str) -> GatewayConfig {
    let mut config = http_sanitizer::config::load_config_from_str(toml).unwrap();
    config.upstream.url = format!("http://{}/", upstream);
    config
}

/// Start a gateway on an ephemeral port.
pub async fn start_gateway(config: GatewayConfig) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (updates, config_updates) = mpsc::unbounded_channel();

    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        shutdown,
        updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// First value the upstream saw for `header`, if any.
pub fn upstream_header<'a>(echo: &'a Value, header: &str) -> Option<&'a str> {
    echo["headers"][header][0].as_str()
}
