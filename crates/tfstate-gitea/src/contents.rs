//! Wire types for the Gitea repository contents API.
//!
//! Only the fields the client reads or writes are modelled; Gitea
//! ignores unknown request fields and serde ignores unknown response
//! fields.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use tfstate_core::{StorageError, StorageResult};

/// `GET /repos/{owner}/{repo}/contents/{path}` response for a file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentsResponse {
    /// Base64-encoded file body. Absent for directories.
    #[serde(default)]
    pub content: Option<String>,
    /// Blob SHA, required when updating the file.
    pub sha: String,
    /// Content encoding. Gitea only ever reports `base64`.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl ContentsResponse {
    /// Decode the base64 body, tolerating line-wrapped encodings.
    pub fn decode(&self) -> StorageResult<Option<Vec<u8>>> {
        let Some(encoded) = &self.content else {
            return Ok(None);
        };
        if let Some(encoding) = self.encoding.as_deref().filter(|e| *e != "base64") {
            return Err(StorageError::Decode(format!("unsupported content encoding {encoding}")));
        }
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        STANDARD
            .decode(compact)
            .map(Some)
            .map_err(|e| StorageError::Decode(format!("file content: {e}")))
    }
}

/// Body for `POST` (create) on the contents endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileRequest {
    pub content: String,
    pub message: String,
    pub branch: String,
}

/// Body for `PUT` (update) on the contents endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateFileRequest {
    pub content: String,
    pub message: String,
    pub branch: String,
    pub sha: String,
}

/// Base64-encode a file body for upload.
pub fn encode(content: &[u8]) -> String {
    STANDARD.encode(content)
}
