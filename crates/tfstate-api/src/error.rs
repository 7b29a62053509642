//! Protocol error responses.
//!
//! Lock-held failures carry the holder's `LockInfo` as a JSON body so
//! the client can report who holds the lock. Everything else is a short
//! text message; storage details stay in the server log.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use tfstate_core::{LockInfo, StorageError};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("state name required")]
    MissingName,

    #[error("failed to read request body")]
    UnreadableBody,

    #[error("invalid lock info")]
    InvalidLockInfo,

    /// A different claim holds the lock (LOCK, POST).
    #[error("state locked by {}", .0.id)]
    Locked(LockInfo),

    /// UNLOCK with a non-empty ID that does not hold the lock.
    #[error("lock held by {}", .0.id)]
    LockMismatch(LockInfo),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("failed to read state: {0}")]
    Retrieve(StorageError),

    #[error("failed to save state: {0}")]
    Save(StorageError),
}

impl ProtocolError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingName | Self::UnreadableBody | Self::InvalidLockInfo => StatusCode::BAD_REQUEST,
            Self::Locked(_) => StatusCode::LOCKED,
            Self::LockMismatch(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Retrieve(_) | Self::Save(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProtocolError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::Locked(held) | Self::LockMismatch(held) => (status, Json(held)).into_response(),
            Self::Retrieve(_) => (status, "internal server error").into_response(),
            Self::Save(_) => (status, "failed to save state").into_response(),
            other => (status, other.to_string()).into_response(),
        }
    }
}
