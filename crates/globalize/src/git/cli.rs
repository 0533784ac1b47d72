use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::parse::format_git_error;
use super::{CommitAuthor, GitClient, GitError};
use crate::process::drain_lines;
use crate::sanitize::{redact_credentials_in, redact_repo_url};

/// [`GitClient`] that shells out to the `git` binary.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, cwd: Option<&Path>, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        cmd.args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }

    /// Runs git and returns its output regardless of exit status.
    async fn run_git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<Output, GitError> {
        let name = args.first().copied().unwrap_or_default().to_string();
        self.command(cwd, args)
            .output()
            .await
            .map_err(|e| spawn_error(name, e))
    }

    /// Runs git and fails on a non-zero exit.
    async fn run_checked(&self, cwd: Option<&Path>, args: &[&str]) -> Result<Output, GitError> {
        let output = self.run_git(cwd, args).await?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(GitError::Command {
                command: args.first().copied().unwrap_or_default().to_string(),
                message: format_git_error(&output),
            })
        }
    }
}

fn spawn_error(command: String, source: std::io::Error) -> GitError {
    if source.kind() == std::io::ErrorKind::NotFound {
        GitError::NotInstalled
    } else {
        GitError::Spawn { command, source }
    }
}

#[async_trait]
impl GitClient for GitCli {
    async fn ensure_available(&self) -> Result<(), GitError> {
        let output = self.run_checked(None, &["--version"]).await?;
        debug!(
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "git available"
        );
        Ok(())
    }

    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        depth: Option<u32>,
    ) -> Result<(), GitError> {
        let dest_str = dest.to_string_lossy();
        let depth_str = depth.map(|d| d.to_string());
        let mut args = vec!["clone", "--progress"];
        if let Some(ref depth) = depth_str {
            args.extend(["--depth", depth.as_str()]);
        }
        args.extend([url, &*dest_str]);

        debug!(url = %redact_repo_url(url), dest = %dest.display(), "git clone");

        let mut child = self
            .command(None, &args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("clone".to_string(), e))?;

        let stderr_pipe = child.stderr.take();
        let stdout_pipe = child.stdout.take();

        let stderr_task = async {
            let mut collected = Vec::new();
            if let Some(stderr) = stderr_pipe {
                drain_lines(stderr, |line| {
                    let line = redact_credentials_in(&line);
                    debug!(target: "globalize::git", "{}", line);
                    collected.push(line);
                })
                .await;
            }
            collected
        };

        let stdout_task = async {
            if let Some(stdout) = stdout_pipe {
                drain_lines(stdout, |_| {}).await;
            }
        };

        let (stderr_lines, ()) = tokio::join!(stderr_task, stdout_task);

        let status = child
            .wait()
            .await
            .map_err(|e| spawn_error("clone".to_string(), e))?;

        if status.success() {
            Ok(())
        } else {
            let message = stderr_lines
                .iter()
                .filter(|l| !l.trim().is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join("\n");
            Err(GitError::Command {
                command: "clone".to_string(),
                message: if message.is_empty() {
                    format!("Clone failed with exit code {}", status.code().unwrap_or(-1))
                } else {
                    message
                },
            })
        }
    }

    async fn remove_remote(&self, repo: &Path, name: &str) -> Result<bool, GitError> {
        let output = self.run_git(Some(repo), &["remote", "remove", name]).await?;
        Ok(output.status.success())
    }

    async fn set_remote(&self, repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.remove_remote(repo, name).await?;
        self.run_checked(Some(repo), &["remote", "add", name, url])
            .await?;
        Ok(())
    }

    async fn remote_url(&self, repo: &Path, name: &str) -> Result<Option<String>, GitError> {
        let output = self
            .run_git(Some(repo), &["remote", "get-url", name])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!url.is_empty()).then_some(url))
    }

    async fn stage_all(&self, repo: &Path) -> Result<(), GitError> {
        self.run_checked(Some(repo), &["add", "."]).await?;
        Ok(())
    }

    async fn set_identity(&self, repo: &Path, name: &str, email: &str) -> Result<(), GitError> {
        self.run_checked(Some(repo), &["config", "user.name", name])
            .await?;
        self.run_checked(Some(repo), &["config", "user.email", email])
            .await?;
        Ok(())
    }

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<(), GitError> {
        let author = author.to_git_author();
        self.run_checked(
            Some(repo),
            &["commit", "-m", message, "--author", author.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn push_force(&self, repo: &Path, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.run_checked(Some(repo), &["push", remote, refspec, "--force"])
            .await?;
        Ok(())
    }
}
