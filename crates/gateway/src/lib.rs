//! HTTP API gateway for Switchyard.
//!
//! Exposes the chat contract, conversation history, health and the
//! knowledge base lifecycle over REST.
//!
//! Built on Axum for high performance async HTTP.

pub mod api;
pub mod error;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, DefaultBodyLimit};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{self, Next};
use axum::response::IntoResponse;
use axum::Router;
use switchyard_agent::AgentRuntime;
use switchyard_core::chat::ErrorBody;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use crate::error::ApiError;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runtime: Arc<AgentRuntime>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl GatewayState {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self {
            runtime,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the full router.
///
/// Layers applied:
/// - CORS restricted to `gateway.allowed_origins`
/// - Request body size limit (`gateway.max_body_bytes`)
/// - In-memory rate limiting (`gateway.rate_limit_per_minute` per client)
/// - HTTP trace logging
pub fn build_router(state: SharedState) -> Router {
    let gateway = state.runtime.config().gateway.clone();

    let origins: Vec<HeaderValue> = gateway
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(
        gateway.rate_limit_per_minute as usize,
        Duration::from_secs(60),
    ));
    let trust_forwarded_for = gateway.trust_forwarded_for;

    api::routes(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, trust_forwarded_for, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Kicks off background ingestion when `knowledge.ingest_on_startup` is set;
/// chat requests are served immediately and get a "not ready" reply from
/// the knowledge agent until the first ingestion finishes.
pub async fn start(runtime: Arc<AgentRuntime>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime.config();
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    if config.knowledge.ingest_on_startup && !runtime.knowledge_status().state().is_ready() {
        runtime.start_background_ingestion();
    } else if let Some(period) = runtime.refresh_interval() {
        // Persisted index already served; only the periodic refresh is needed.
        let job = runtime.ingestion().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _ = job.try_run().await;
            }
        });
    }

    let app = build_router(Arc::new(GatewayState::new(runtime.clone())));

    info!(addr = %addr, provider = runtime.provider_name(), "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

// --- Rate Limiter ---

/// Simple in-memory sliding-window rate limiter.
///
/// Tracks request timestamps per client key.
/// Thread-safe via `std::sync::Mutex` (non-async, held briefly).
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        // Evict idle clients once the map grows large.
        if clients.len() > 10_000 {
            clients.retain(|_, timestamps| {
                timestamps
                    .last()
                    .is_some_and(|t| now.duration_since(*t) < self.window)
            });
        }

        let timestamps = clients.entry(client_key.to_string()).or_default();
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push(now);
        true
    }
}

/// Client key: bearer token, then the first forwarded address when the
/// proxy is trusted, then the peer address, else "anonymous".
fn client_key(req: &axum::extract::Request, trust_forwarded_for: bool) -> String {
    let headers = req.headers();
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        return auth.to_string();
    }
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| trust_forwarded_for && !v.is_empty());
    if let Some(forwarded) = forwarded {
        return forwarded.to_string();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string())
}

/// Returns 429 with a `RATE_LIMITED` error body when a client exceeds its
/// window. `/health` is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    trust_forwarded_for: bool,
    req: axum::extract::Request,
    next: Next,
) -> axum::response::Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }

    let key = client_key(&req, trust_forwarded_for);
    if !limiter.check(&key) {
        warn!(client = %key.chars().take(20).collect::<String>(), "Rate limit exceeded");
        let body = ErrorBody::new(
            "RATE_LIMITED",
            "Too many requests. Please slow down and try again in a minute.",
            uuid::Uuid::new_v4().to_string(),
        );
        return ApiError::new(axum::http::StatusCode::TOO_MANY_REQUESTS, body).into_response();
    }

    next.run(req).await
}
