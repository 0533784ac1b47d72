use std::sync::Arc;

use tracing::{error, info, warn};

use crate::job::{JobStats, LogEntry, LogLevel};
use crate::store::{JobPatch, JobStore, StoreError};

/// Writes one job's log entries and progress fields to the job store, and
/// mirrors every entry to `tracing`.
#[derive(Clone)]
pub struct JobLogger {
    store: Arc<dyn JobStore>,
    job_id: String,
}

impl JobLogger {
    pub fn new(store: Arc<dyn JobStore>, job_id: impl Into<String>) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn log(&self, entry: LogEntry) -> Result<(), StoreError> {
        let job_id = self.job_id.as_str();
        let step = entry.step.as_str();
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                info!(job_id, step, level = entry.level.as_str(), "{}", entry.message)
            }
            LogLevel::Warning => warn!(job_id, step, "{}", entry.message),
            LogLevel::Error => error!(job_id, step, "{}", entry.message),
        }
        self.store.append_log(&self.job_id, entry).await
    }

    pub async fn info(&self, step: &str, message: impl Into<String>) -> Result<(), StoreError> {
        self.log(LogEntry::new(step, LogLevel::Info, message)).await
    }

    pub async fn success(&self, step: &str, message: impl Into<String>) -> Result<(), StoreError> {
        self.log(LogEntry::new(step, LogLevel::Success, message))
            .await
    }

    pub async fn warning(&self, step: &str, message: impl Into<String>) -> Result<(), StoreError> {
        self.log(LogEntry::new(step, LogLevel::Warning, message))
            .await
    }

    pub async fn error(&self, step: &str, message: impl Into<String>) -> Result<(), StoreError> {
        self.log(LogEntry::new(step, LogLevel::Error, message)).await
    }

    pub async fn set_current_step(&self, step: Option<&str>) -> Result<(), StoreError> {
        self.store
            .update_fields(&self.job_id, JobPatch::new().current_step(step))
            .await
    }

    pub async fn update_stats(&self, stats: JobStats) -> Result<(), StoreError> {
        self.store
            .update_fields(&self.job_id, JobPatch::new().stats(stats))
            .await
    }

    pub async fn set_pr_url(&self, url: &str) -> Result<(), StoreError> {
        self.store
            .update_fields(&self.job_id, JobPatch::new().pr_url(url))
            .await
    }
}
