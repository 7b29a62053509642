//! State protocol handlers.
//!
//! Implements the Terraform/OpenTofu `http` backend contract on one
//! path per state:
//!
//! | Method | Effect |
//! |---|---|
//! | GET | return stored state, 404 when never saved |
//! | POST | save state, 423 when another claim holds the lock |
//! | LOCK | acquire the lock, 423 with the holder on conflict |
//! | UNLOCK | release the lock, 409 with the holder on mismatch |

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{error, info, warn};

use tfstate_core::{Acquire, LockInfo, Release, StateName, state_path};

use crate::AppState;
use crate::error::ProtocolError;

/// Header carrying the caller's lock ID on POST.
pub const LOCK_ID_HEADER: &str = "Lock-Id";

/// Query fallback for the lock ID (`?ID=...`).
#[derive(Debug, Deserialize)]
struct LockIdQuery {
    #[serde(rename = "ID")]
    id: Option<String>,
}

type ProtocolResult = Result<Response, ProtocolError>;

/// Any method on `/`, where no state is addressed.
pub async fn missing_name() -> ProtocolError {
    ProtocolError::MissingName
}

/// Any method on `/{*name}`.
pub async fn handle_state(
    State(state): State<AppState>,
    Path(raw_name): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let Some(name) = StateName::from_path(&raw_name) else {
        return ProtocolError::MissingName.into_response();
    };

    let result = match method.as_str() {
        "GET" => retrieve(&state, &name).await,
        "POST" => save(&state, &name, &headers, &uri, body).await,
        "LOCK" => lock(&state, &name, body),
        "UNLOCK" => unlock(&state, &name, body),
        _ => Err(ProtocolError::MethodNotAllowed),
    };

    result.unwrap_or_else(IntoResponse::into_response)
}

async fn retrieve(state: &AppState, name: &StateName) -> ProtocolResult {
    match state.storage.read(&state_path(name)).await {
        Ok(Some(stored)) => {
            Ok(([(CONTENT_TYPE, "application/json")], stored.content).into_response())
        }
        Ok(None) => Ok((StatusCode::NOT_FOUND, "404 page not found").into_response()),
        Err(e) => {
            error!(state = %name, error = %e, "failed to read state");
            Err(ProtocolError::Retrieve(e))
        }
    }
}

/// The caller's claim: `Lock-Id` header, else the `ID` query parameter.
fn claimed_lock_id(headers: &HeaderMap, uri: &Uri) -> String {
    let from_header = headers
        .get(LOCK_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty());
    if let Some(id) = from_header {
        return id.to_string();
    }
    Query::<LockIdQuery>::try_from_uri(uri)
        .ok()
        .and_then(|Query(q)| q.id)
        .unwrap_or_default()
}

async fn save(
    state: &AppState,
    name: &StateName,
    headers: &HeaderMap,
    uri: &Uri,
    body: Result<Bytes, BytesRejection>,
) -> ProtocolResult {
    if let Some(held) = state.locks.peek(name) {
        let claimed = claimed_lock_id(headers, uri);
        if claimed != held.id {
            warn!(state = %name, held = %held.id, %claimed, "save rejected, state locked");
            return Err(ProtocolError::Locked(held));
        }
    }

    let body = body.map_err(|e| {
        warn!(state = %name, error = %e, "failed to read state body");
        ProtocolError::UnreadableBody
    })?;

    let size = body.len();
    let message = format!("Update state: {name}");
    if let Err(e) = state.storage.write(&state_path(name), body, &message).await {
        error!(state = %name, error = %e, "failed to save state");
        return Err(ProtocolError::Save(e));
    }

    info!(state = %name, bytes = size, "state saved");
    Ok(StatusCode::OK.into_response())
}

fn parse_lock_info(name: &StateName, body: Result<Bytes, BytesRejection>) -> Result<LockInfo, ProtocolError> {
    let body = body.map_err(|e| {
        warn!(state = %name, error = %e, "failed to read lock body");
        ProtocolError::UnreadableBody
    })?;
    serde_json::from_slice(&body).map_err(|e| {
        warn!(state = %name, error = %e, "failed to parse lock body");
        ProtocolError::InvalidLockInfo
    })
}

fn lock(state: &AppState, name: &StateName, body: Result<Bytes, BytesRejection>) -> ProtocolResult {
    let claim = parse_lock_info(name, body)?;

    match state.locks.acquire(name, claim) {
        Acquire::Acquired(held) => {
            info!(state = %name, id = %held.id, who = %held.who, operation = %held.operation, "state locked");
            Ok((StatusCode::OK, Json(held)).into_response())
        }
        Acquire::Conflict(held) => {
            warn!(state = %name, held = %held.id, "lock rejected, already held");
            Err(ProtocolError::Locked(held))
        }
    }
}

fn unlock(state: &AppState, name: &StateName, body: Result<Bytes, BytesRejection>) -> ProtocolResult {
    let request = parse_lock_info(name, body)?;

    match state.locks.release(name, &request.id) {
        Release::Released => {
            info!(state = %name, forced = request.id.is_empty(), "state unlocked");
            Ok(StatusCode::OK.into_response())
        }
        Release::NoOp => Ok(StatusCode::OK.into_response()),
        Release::Conflict(held) => {
            warn!(state = %name, held = %held.id, requested = %request.id, "unlock rejected, lock mismatch");
            Err(ProtocolError::LockMismatch(held))
        }
    }
}
