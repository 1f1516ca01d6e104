//! HTTP server setup and the proxy handler.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, timeout, tracing)
//! - Hold the active rule set and swap it on reload
//! - Buffer each request, run the proxy hooks and forward upstream
//! - Access logging and request metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        header::{
            CONNECTION, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE, TRAILER,
            TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, HeaderName, Request, StatusCode, Version,
    },
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::GatewayConfig;
use crate::http::hooks::{self, InvalidUpstream, Upstream};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::observability::metrics;
use crate::sanitize::RuleSet;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 9] = [
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    HeaderName::from_static("proxy-connection"),
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    TE,
    TRAILER,
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Error type for server setup and serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Upstream(#[from] InvalidUpstream),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<ArcSwap<RuleSet>>,
    pub upstream: Arc<Upstream>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the sanitizing gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    rules: Arc<ArcSwap<RuleSet>>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, ServerError> {
        let upstream = Arc::new(Upstream::parse(&config.upstream.url)?);
        let rules = Arc::new(ArcSwap::from_pointee(RuleSet::from_config(&config)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.timeouts.idle_secs))
            .build(HttpConnector::new());

        let state = AppState {
            rules: rules.clone(),
            upstream,
            client,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            rules,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    /// Handle to the active rule set.
    pub fn rules(&self) -> Arc<ArcSwap<RuleSet>> {
        self.rules.clone()
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configs received on `config_updates` replace the active rule set.
    /// Serving stops gracefully when `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.url,
            "HTTP server starting"
        );

        let rules = self.rules.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let new_rules = RuleSet::from_config(&config);
                tracing::info!(fields = new_rules.field_count(), "Rule set reloaded");
                rules.store(Arc::new(new_rules));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Main proxy handler.
/// Sanitizes the request, forwards it upstream and filters the response.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(request.headers());
    let method = request.method().clone();
    let host = request
        .headers()
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let path = request.uri().path().to_string();

    // One snapshot per request; a reload mid-request does not affect it.
    let rules = state.rules.load_full();

    let (mut parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            metrics::record_request(method.as_str(), 400, start_time);
            return (StatusCode::BAD_REQUEST, "Unreadable request body").into_response();
        }
    };

    strip_hop_by_hop(&mut parts.headers);
    let (mut parts, body) = hooks::pre_forward(&rules, &state.upstream, parts, body);
    parts.version = Version::HTTP_11;

    tracing::debug!(
        request_id = %request_id,
        target = %parts.uri,
        "Forwarding request"
    );

    let response = match state.client.request(Request::from_parts(parts, Body::from(body))).await {
        Ok(response) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            let parts = hooks::post_receive(&rules, parts);
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    };

    let status = response.status();
    metrics::record_request(method.as_str(), status.as_u16(), start_time);
    tracing::info!(
        request_id = %request_id,
        method = %method,
        host = %host,
        path = %path,
        status = status.as_u16(),
        duration = ?start_time.elapsed(),
        "Request completed"
    );

    response
}

/// Remove hop-by-hop headers, including any named in `Connection`.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}
