//! tfstate-gitea: Gitea-backed state storage.
//!
//! Implements [`tfstate_core::StateStorage`] over the repository contents
//! API (`/api/v1/repos/{owner}/{repo}/contents/{path}`). Reads return the
//! decoded file and its blob SHA; writes create or update the file with
//! a commit on the configured branch.

pub mod client;
pub mod contents;

pub use client::{GiteaClient, GiteaConfig};
