//! tfstate-api: HTTP surface of the remote state server.
//!
//! Provides the axum router implementing Terraform/OpenTofu's `http`
//! state backend, plus health and Prometheus endpoints.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/health` | Liveness probe, never authenticated |
//! | GET | `/metrics` | Prometheus exposition, never authenticated |
//! | GET | `/{name}` | Fetch state |
//! | POST | `/{name}` | Save state |
//! | LOCK | `/{name}` | Acquire the state lock |
//! | UNLOCK | `/{name}` | Release the state lock |
//!
//! `LOCK` and `UNLOCK` are extension methods, so state routes use `any`
//! and dispatch on the method inside the handler.

pub mod error;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{any, get};

use tfstate_core::{LockTable, StateStorage};
use tfstate_metrics::HttpMetrics;

pub use error::ProtocolError;
pub use middleware::AuthToken;

/// Default cap on request bodies (50 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 << 20;

/// Shared state for handlers. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub locks: Arc<LockTable>,
    pub storage: Arc<dyn StateStorage>,
    pub metrics: Arc<HttpMetrics>,
}

impl AppState {
    /// Fresh lock table and metrics around the given storage backend.
    pub fn new(storage: Arc<dyn StateStorage>) -> Self {
        Self {
            locks: Arc::new(LockTable::new()),
            storage,
            metrics: Arc::new(HttpMetrics::new()),
        }
    }
}

/// Router settings that come from configuration.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Required token for state routes; `None` disables authentication.
    pub auth_token: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            auth_token: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Build the complete router (state protocol + health + metrics).
pub fn build_router(state: AppState, options: RouterOptions) -> Router {
    let mut state_routes = Router::new()
        .route("/", any(handlers::missing_name))
        .route("/{*name}", any(handlers::handle_state));

    if let Some(token) = options.auth_token {
        state_routes = state_routes.route_layer(axum::middleware::from_fn_with_state(
            AuthToken::new(token),
            middleware::require_token,
        ));
    }

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .merge(state_routes)
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            middleware::observe,
        ))
        .with_state(state)
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = tfstate_metrics::render_prometheus(&state.metrics, state.locks.len());
    (
        StatusCode::OK,
        [("content-type", tfstate_metrics::CONTENT_TYPE)],
        body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfstate_core::MemoryStorage;

    fn test_state() -> AppState {
        AppState::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn health_is_ok_json() {
        let resp = health().await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert_eq!(content_type, "application/json");
        let body = axum::body::to_bytes(resp.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn prometheus_endpoint_reports_locks() {
        let state = test_state();
        state.locks.acquire(
            &tfstate_core::StateName::from_path("proj").unwrap(),
            tfstate_core::LockInfo::with_id("a"),
        );

        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));

        let body = axum::body::to_bytes(resp.into_body(), 1 << 16).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("tfstate_locks_active 1"));
    }
}
