//! Storage port for state documents.
//!
//! The protocol handler only needs to read one document and upsert one
//! document. Backends decide how a write becomes a durable revision
//! (a commit, an object version, a file rename).

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StorageResult;
use crate::types::StoredState;

/// A revisioned content store keyed by path.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Read the document at `path`. A missing document is `Ok(None)`.
    async fn read(&self, path: &str) -> StorageResult<Option<StoredState>>;

    /// Create or replace the document at `path`.
    ///
    /// `message` annotates the resulting revision and has no effect on
    /// protocol behaviour.
    async fn write(&self, path: &str, content: Bytes, message: &str) -> StorageResult<()>;
}

/// A single revision recorded by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub path: String,
    pub message: String,
    pub revision: String,
}

#[derive(Debug, Default)]
struct MemoryInner {
    files: HashMap<String, StoredState>,
    history: Vec<Revision>,
}

/// Ephemeral in-process storage (for tests and local runs).
///
/// Revision tokens are a counter rendered as text.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes so far, oldest first.
    pub async fn history(&self) -> Vec<Revision> {
        self.inner.read().await.history.clone()
    }

    /// Seed a document without recording a revision.
    pub async fn insert(&self, path: &str, content: impl Into<Bytes>) {
        let mut inner = self.inner.write().await;
        inner.files.insert(
            path.to_string(),
            StoredState {
                content: content.into(),
                revision: "seed".to_string(),
            },
        );
    }
}

#[async_trait]
impl StateStorage for MemoryStorage {
    async fn read(&self, path: &str) -> StorageResult<Option<StoredState>> {
        Ok(self.inner.read().await.files.get(path).cloned())
    }

    async fn write(&self, path: &str, content: Bytes, message: &str) -> StorageResult<()> {
        let mut inner = self.inner.write().await;
        let revision = (inner.history.len() + 1).to_string();
        inner.files.insert(
            path.to_string(),
            StoredState {
                content,
                revision: revision.clone(),
            },
        );
        inner.history.push(Revision {
            path: path.to_string(),
            message: message.to_string(),
            revision,
        });
        debug!(%path, "document stored in memory");
        Ok(())
    }
}
