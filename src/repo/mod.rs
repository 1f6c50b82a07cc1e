//! Repository proxy - the source-control host as seen by the agent
//!
//! Every file operation the agent performs goes through `RepositoryProxy`.
//! `GitHubRepository` talks to the GitHub REST API; `MemoryRepository` is an
//! in-process fake used by tests and dry runs.

pub mod github;
pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::RepoRef;

pub use github::{GITHUB_API_BASE, GitHubRepository, GitHubRepositoryFactory};
pub use memory::{FailPoint, MemoryRepository, PullRequestRecord};

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

impl DirEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: false,
        }
    }

    pub fn dir(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_dir: true,
        }
    }
}

/// Operations against one repository on the source-control host
///
/// Paths are repository-relative with `/` separators; the empty string is
/// the root.
#[async_trait]
pub trait RepositoryProxy: Send + Sync {
    /// Branch new work is cut from when none is configured
    async fn default_branch(&self) -> Result<String, RepositoryError>;

    /// Create `branch` pointing at the head of `base`
    async fn create_branch(&self, base: &str, branch: &str) -> Result<(), RepositoryError>;

    /// List the entries of a directory
    async fn get_directory(&self, branch: &str, path: &str) -> Result<Vec<DirEntry>, RepositoryError>;

    /// Read a text file
    async fn read_file(&self, branch: &str, path: &str) -> Result<String, RepositoryError>;

    /// Create or overwrite a file with one commit; returns the commit sha
    async fn update_file(
        &self,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
    ) -> Result<String, RepositoryError>;

    /// Open a pull request from `head` into `base`; returns its URL
    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<String, RepositoryError>;
}

/// Opens a proxy for a resolved target repository
pub trait RepositoryFactory: Send + Sync {
    fn open(&self, repo: &RepoRef) -> Result<Arc<dyn RepositoryProxy>, RepositoryError>;
}

impl<F> RepositoryFactory for F
where
    F: Fn(&RepoRef) -> Result<Arc<dyn RepositoryProxy>, RepositoryError> + Send + Sync,
{
    fn open(&self, repo: &RepoRef) -> Result<Arc<dyn RepositoryProxy>, RepositoryError> {
        self(repo)
    }
}

/// Errors from the source-control host
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Path not found: {path}")]
    NotFound { path: String },

    #[error("File is binary or not valid UTF-8: {path}")]
    BinaryContent { path: String },

    #[error("File is too large to read ({size} bytes): {path}")]
    TooLarge { path: String, size: u64 },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Repository call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

impl RepositoryError {
    /// Errors the model can recover from by choosing a different action
    pub fn is_tool_level(&self) -> bool {
        matches!(
            self,
            RepositoryError::NotFound { .. }
                | RepositoryError::BinaryContent { .. }
                | RepositoryError::TooLarge { .. }
        )
    }
}

/// Bound a repository call by `limit`, if one is set
pub async fn with_timeout<T, F>(limit: Option<Duration>, call: F) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, RepositoryError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| RepositoryError::Timeout {
                after_ms: limit.as_millis() as u64,
            })?,
        None => call.await,
    }
}
