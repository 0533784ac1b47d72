//! Translation CLI invocation.
//!
//! Locale files are produced by an external command (the Lingo.dev CLI by
//! default) run inside the repository with the service key in its
//! environment. Output lines are streamed to tracing and kept for error
//! reporting.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio::process::Command;
use tracing::debug;

use crate::process::drain_lines;

/// Environment variable the CLI reads its key from.
pub const LINGO_API_KEY_ENV: &str = "LINGODOTDEV_API_KEY";

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Exit status and captured output of one CLI run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Stderr when it has content, otherwise stdout.
    pub fn diagnostic_output(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim_end()
        } else {
            self.stderr.trim_end()
        }
    }
}

#[async_trait]
pub trait TranslationCli: Send + Sync {
    async fn run(&self, repo_dir: &Path, api_key: &SecretString)
        -> Result<CommandOutput, TranslatorError>;
}

/// Runs `{program} {args...}` in the repository.
#[derive(Debug, Clone)]
pub struct LingoCli {
    program: String,
    args: Vec<String>,
}

impl LingoCli {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        let program = program.into();
        let program = if cfg!(windows) && program == "npx" {
            "npx.cmd".to_string()
        } else {
            program
        };
        Self { program, args }
    }
}

impl Default for LingoCli {
    fn default() -> Self {
        Self::new(
            "npx",
            vec!["lingo.dev@latest".to_string(), "i18n".to_string()],
        )
    }
}

async fn collect_lines<R: AsyncRead + Unpin>(pipe: Option<R>, stream: &'static str) -> String {
    let mut collected = String::new();
    if let Some(pipe) = pipe {
        drain_lines(pipe, |line| {
            debug!(target: "globalize::translator", stream, "{}", line);
            collected.push_str(&line);
            collected.push('\n');
        })
        .await;
    }
    collected
}

#[async_trait]
impl TranslationCli for LingoCli {
    async fn run(
        &self,
        repo_dir: &Path,
        api_key: &SecretString,
    ) -> Result<CommandOutput, TranslatorError> {
        debug!(program = %self.program, args = ?self.args, "running translation CLI");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(repo_dir)
            .env(LINGO_API_KEY_ENV, api_key.expose_secret())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranslatorError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let (stdout, stderr) = tokio::join!(
            collect_lines(child.stdout.take(), "stdout"),
            collect_lines(child.stderr.take(), "stderr"),
        );

        let status = child.wait().await.map_err(|source| TranslatorError::Wait {
            program: self.program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}
