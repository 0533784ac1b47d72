//! Code-hosting API used for forks, framework detection and pull requests.
//!
//! The pipeline talks to GitHub only through [`HostingApi`]. A
//! [`HostingConnector`] builds one client per run from that run's
//! credentials, so several users' runs can share a process.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;
mod url;

pub use client::{GitHubClient, GitHubConnector, DEFAULT_API_BASE_URL};
pub use url::{authenticated_remote_url, embed_token, parse_repo_url, RepoRef};

#[derive(Error, Debug)]
pub enum HostingError {
    #[error("GitHub API request failed ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("GitHub resource not found: {0}")]
    NotFound(String),

    #[error("GitHub request failed: {0}")]
    Transport(String),

    #[error("Unexpected GitHub response: {0}")]
    Decode(String),
}

impl HostingError {
    /// HTTP status of the failed call, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            HostingError::Api { status, .. } => Some(*status),
            HostingError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// Subset of the repository resource the pipeline reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoInfo {
    pub full_name: String,
    pub default_branch: String,
    pub owner: RepoOwner,
    #[serde(default)]
    pub fork: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    pub title: String,
    pub head: String,
    pub base: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

#[async_trait]
pub trait HostingApi: Send + Sync {
    async fn get_repo(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError>;

    /// Requests a fork into the authenticated account. Forking is
    /// asynchronous on the host; poll [`HostingApi::get_repo`] for readiness.
    async fn create_fork(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError>;

    /// Login of the authenticated account.
    async fn current_user(&self) -> Result<String, HostingError>;

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError>;

    /// Finds an open pull request whose head is `head` (`owner:branch`).
    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Option<PullRequest>, HostingError>;

    /// Decoded text of a file at the default branch.
    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<String, HostingError>;

    async fn list_directory(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<DirEntry>, HostingError>;
}

/// Builds a hosting client for one run's credentials.
pub trait HostingConnector: Send + Sync {
    fn connect(&self, token: Option<&SecretString>) -> Result<Arc<dyn HostingApi>, HostingError>;
}
