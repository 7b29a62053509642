//! Request middleware: token authentication and request observation.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};

use tfstate_metrics::HttpMetrics;

/// Shared secret accepted by [`require_token`].
#[derive(Clone)]
pub struct AuthToken(pub Arc<str>);

impl AuthToken {
    pub fn new(token: impl Into<Arc<str>>) -> Self {
        Self(token.into())
    }
}

/// Extract the presented secret from an `Authorization` header value.
///
/// Accepts `Bearer <token>`, or `Basic` credentials whose password is the
/// token (Terraform's `http` backend sends `password` this way). The
/// username is ignored.
pub fn presented_token(header: &str) -> Option<String> {
    if let Some(token) = header.strip_prefix("Bearer ") {
        return Some(token.to_string());
    }
    let encoded = header.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;
    let (_user, password) = credentials.split_once(':')?;
    Some(password.to_string())
}

/// Compare without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, r#"Bearer realm="terraform-state""#)],
        "unauthorized",
    )
        .into_response()
}

/// Reject requests that do not present the configured token.
pub async fn require_token(State(expected): State<AuthToken>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(presented_token);

    match presented {
        Some(token) if constant_time_eq(token.as_bytes(), expected.0.as_bytes()) => next.run(req).await,
        _ => {
            debug!(path = %req.uri().path(), "rejected unauthenticated request");
            unauthorized()
        }
    }
}

/// Log every request and record it in the HTTP metrics.
///
/// Scrapes of `/metrics` are logged but not counted.
pub async fn observe(State(metrics): State<Arc<HttpMetrics>>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let resp = next.run(req).await;

    let elapsed = start.elapsed();
    let status = resp.status().as_u16();
    info!(%method, %path, status, elapsed_ms = elapsed.as_millis() as u64, "request");

    if path != "/metrics" {
        metrics.record(method.as_str(), status, elapsed);
    }
    resp
}
