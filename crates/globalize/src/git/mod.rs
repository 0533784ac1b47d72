//! Version-control operations the pipeline needs, behind [`GitClient`].

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

mod cli;
mod parse;

pub use cli::GitCli;
pub use parse::format_git_error;

/// Shown when the `git` binary cannot be spawned.
pub const GIT_REQUIRED_MESSAGE: &str = "Git is not installed in this environment. \
The pipeline needs Git to clone and push repositories. \
Deploy to a platform that includes Git (e.g. a Docker image with git installed).";

#[derive(Error, Debug)]
pub enum GitError {
    #[error("{}", GIT_REQUIRED_MESSAGE)]
    NotInstalled,

    #[error("git {command} failed: {message}")]
    Command { command: String, message: String },

    #[error("Failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Author recorded on the pipeline's commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl CommitAuthor {
    /// `Name <email>` form accepted by `git commit --author`.
    pub fn to_git_author(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

#[async_trait]
pub trait GitClient: Send + Sync {
    /// Fails with [`GitError::NotInstalled`] when git cannot be run.
    async fn ensure_available(&self) -> Result<(), GitError>;

    /// Clones `url` into `dest`, shallow when `depth` is given.
    async fn clone_repo(&self, url: &str, dest: &Path, depth: Option<u32>)
        -> Result<(), GitError>;

    /// Removes remote `name`. Returns whether it existed.
    async fn remove_remote(&self, repo: &Path, name: &str) -> Result<bool, GitError>;

    /// Points remote `name` at `url`, replacing any existing definition.
    async fn set_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError>;

    async fn remote_url(&self, repo: &Path, name: &str) -> Result<Option<String>, GitError>;

    async fn stage_all(&self, repo: &Path) -> Result<(), GitError>;

    /// Sets the repository-local `user.name` / `user.email`.
    async fn set_identity(&self, repo: &Path, name: &str, email: &str) -> Result<(), GitError>;

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<(), GitError>;

    /// Force-pushes `refspec` to `remote`.
    async fn push_force(&self, repo: &Path, remote: &str, refspec: &str) -> Result<(), GitError>;
}
