//! Job data model.
//!
//! A [`Job`] is the persisted record of one internationalization request:
//! the target repository, the requested languages, the lifecycle status,
//! the running counters, and an append-only log that the dashboard renders.

use std::fmt;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::github::parse_repo_url;

mod summary;

pub use summary::step_summary;

static RE_LANGUAGE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z]{2,3}(-[A-Za-z0-9]{2,8})*$").unwrap());

/// Whether `code` looks like a BCP 47 tag such as `es` or `pt-BR`.
pub fn is_language_code(code: &str) -> bool {
    RE_LANGUAGE_CODE.is_match(code)
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }

    /// Returns true for statuses a run can never leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters accumulated by a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub files_modified: u64,
    pub strings_found: u64,
    pub languages_added: u64,
}

/// Severity of a job log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Success => "success",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        }
    }
}

/// One entry in a job's append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Step name, or `"pipeline"` for runner-level entries.
    pub step: String,
    pub level: LogLevel,
    pub message: String,
    pub ts: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(step: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            level,
            message: message.into(),
            ts: Utc::now(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    pub repo_url: String,
    pub repo_owner: String,
    pub repo_name: String,
    #[serde(default)]
    pub languages: Vec<String>,
    pub status: JobStatus,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub stats: JobStats,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Errors raised when building a job from a request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Invalid GitHub repository URL: {0}")]
    InvalidRepoUrl(String),
    #[error("Invalid language code: '{0}'")]
    InvalidLanguage(String),
}

/// Request to create a job.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewJob {
    pub repo_url: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
}

impl NewJob {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Default::default()
        }
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_github_username(mut self, username: impl Into<String>) -> Self {
        self.github_username = Some(username.into());
        self
    }
}

impl Job {
    /// Builds a pending job with a fresh id, zeroed stats and an empty log.
    pub fn create(request: NewJob) -> Result<Self, JobError> {
        let repo = parse_repo_url(&request.repo_url)
            .ok_or_else(|| JobError::InvalidRepoUrl(request.repo_url.clone()))?;
        if let Some(bad) = request.languages.iter().find(|l| !is_language_code(l)) {
            return Err(JobError::InvalidLanguage(bad.clone()));
        }
        let now = Utc::now();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: request.user_id,
            github_username: request.github_username,
            repo_url: request.repo_url,
            repo_owner: repo.owner,
            repo_name: repo.name,
            languages: request.languages,
            status: JobStatus::Pending,
            current_step: None,
            pr_url: None,
            stats: JobStats::default(),
            logs: Vec::new(),
            error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// `owner/name` of the source repository.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.repo_owner, self.repo_name)
    }
}
