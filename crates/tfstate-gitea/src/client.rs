//! Gitea contents API client.
//!
//! Every state save becomes one commit on the configured branch.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::AUTHORIZATION;
use reqwest::{StatusCode, Url};
use tracing::{debug, warn};

use tfstate_core::{StateStorage, StorageError, StorageResult, StoredState};

use crate::contents::{ContentsResponse, CreateFileRequest, UpdateFileRequest, encode};

/// Connection settings for a Gitea repository.
#[derive(Debug, Clone)]
pub struct GiteaConfig {
    /// Server root, e.g. `https://gitea.example.com`.
    pub base_url: String,
    /// Personal access token with repository write scope.
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// Storage backend that keeps state files in a Gitea repository.
#[derive(Debug, Clone)]
pub struct GiteaClient {
    http: reqwest::Client,
    base_url: Url,
    auth_header: String,
    owner: String,
    repo: String,
    branch: String,
}

fn transport(e: reqwest::Error) -> StorageError {
    StorageError::Transport(e.to_string())
}

impl GiteaClient {
    pub fn new(config: GiteaConfig) -> StorageResult<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| StorageError::Config(format!("gitea url {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(StorageError::Config(format!(
                "gitea url {} cannot be a base",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("tfstated/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            auth_header: format!("token {}", config.token),
            owner: config.owner,
            repo: config.repo,
            branch: config.branch,
        })
    }

    /// `{base}/api/v1/repos/{owner}/{repo}/contents/{path}` with each
    /// segment percent-encoded.
    pub fn contents_url(&self, path: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v1", "repos", &self.owner, &self.repo, "contents"])
                .extend(path.split('/'));
        }
        url
    }

    /// Fetch file metadata and content. `Ok(None)` when the file is absent.
    pub async fn get_file(&self, path: &str) -> StorageResult<Option<ContentsResponse>> {
        let resp = self
            .http
            .get(self.contents_url(path))
            .query(&[("ref", self.branch.as_str())])
            .header(AUTHORIZATION, &self.auth_header)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            StatusCode::NOT_FOUND => {
                debug!(%path, "file not found");
                Ok(None)
            }
            status if status.is_success() => {
                let file: ContentsResponse = resp
                    .json()
                    .await
                    .map_err(|e| StorageError::Decode(format!("{path}: {e}")))?;
                Ok(Some(file))
            }
            status => Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
        }
    }

    /// Create a new file. Fails with `AlreadyExists` if it is present.
    pub async fn create_file(&self, path: &str, content: &[u8], message: &str) -> StorageResult<()> {
        let body = CreateFileRequest {
            content: encode(content),
            message: message.to_string(),
            branch: self.branch.clone(),
        };
        let resp = self
            .http
            .post(self.contents_url(path))
            .header(AUTHORIZATION, &self.auth_header)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        match resp.status() {
            // Gitea answers 422 when the path already holds a file.
            StatusCode::UNPROCESSABLE_ENTITY => Err(StorageError::AlreadyExists(path.to_string())),
            status if status.is_success() => {
                debug!(%path, "file created");
                Ok(())
            }
            status => Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
        }
    }

    /// Replace an existing file whose current blob is `sha`.
    pub async fn update_file(
        &self,
        path: &str,
        content: &[u8],
        sha: &str,
        message: &str,
    ) -> StorageResult<()> {
        let body = UpdateFileRequest {
            content: encode(content),
            message: message.to_string(),
            branch: self.branch.clone(),
            sha: sha.to_string(),
        };
        let resp = self
            .http
            .put(self.contents_url(path))
            .header(AUTHORIZATION, &self.auth_header)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status.is_success() {
            debug!(%path, "file updated");
            Ok(())
        } else {
            Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            })
        }
    }
}

#[async_trait]
impl StateStorage for GiteaClient {
    async fn read(&self, path: &str) -> StorageResult<Option<StoredState>> {
        let Some(file) = self.get_file(path).await? else {
            return Ok(None);
        };
        Ok(file.decode()?.map(|content| StoredState {
            content: Bytes::from(content),
            revision: file.sha,
        }))
    }

    async fn write(&self, path: &str, content: Bytes, message: &str) -> StorageResult<()> {
        if let Some(existing) = self.get_file(path).await? {
            return self.update_file(path, &content, &existing.sha, message).await;
        }

        match self.create_file(path, &content, message).await {
            Err(StorageError::AlreadyExists(_)) => {
                // Created between our read and create; retry as an update.
                warn!(%path, "file appeared during create, retrying as update");
                match self.get_file(path).await? {
                    Some(existing) => self.update_file(path, &content, &existing.sha, message).await,
                    None => Err(StorageError::AlreadyExists(path.to_string())),
                }
            }
            other => other,
        }
    }
}
