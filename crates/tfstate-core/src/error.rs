//! Error types for state storage backends.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors a storage backend can report.
///
/// A missing document is not an error; `read` returns `Ok(None)` for it.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status} for {path}")]
    Status { status: u16, path: String },

    #[error("decode error: {0}")]
    Decode(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid backend configuration: {0}")]
    Config(String),
}
