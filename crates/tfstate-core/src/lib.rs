//! tfstate-core: state and lock primitives for the remote state server.
//!
//! # Architecture
//!
//! ```text
//! LockTable          in-process map: state name → held LockInfo
//! StateStorage       async port: read / create-or-replace by path
//!   └── MemoryStorage    in-process backend for tests
//! ```
//!
//! State content is opaque bytes. Each state name maps to exactly one
//! storage path through [`state_path`].

pub mod error;
pub mod locks;
pub mod storage;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use locks::{Acquire, LockTable, Release};
pub use storage::{MemoryStorage, Revision, StateStorage};
pub use types::*;
