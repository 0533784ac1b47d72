//! Job store: the persistence contract the pipeline reads and writes through.
//!
//! [`JobStore`] is the only way the engine touches job state. Two
//! implementations ship with the crate: [`SqliteJobStore`] over the
//! rusqlite [`Database`](crate::db::Database) and [`MemoryJobStore`] for
//! embedding and tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{Job, JobStats, JobStatus, LogEntry};

mod cancel;
pub mod lifecycle;
mod memory;
mod sqlite;

pub use cancel::{CancellationFlags, CancellationProbe, StoreCancellation};
pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

/// Errors surfaced by a job store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Stored job '{id}' is malformed: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Failed to serialize job data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Job store unavailable: {0}")]
    Unavailable(String),

    /// The requested lifecycle change does not apply to the job's status.
    #[error("{0}")]
    Conflict(String),
}

/// Partial update of a job. `None` leaves a field untouched; for nullable
/// fields `Some(None)` clears the value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub current_step: Option<Option<String>>,
    pub error: Option<Option<String>>,
    pub pr_url: Option<Option<String>>,
    pub stats: Option<JobStats>,
}

impl JobPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn current_step(mut self, step: Option<&str>) -> Self {
        self.current_step = Some(step.map(str::to_string));
        self
    }

    pub fn error(mut self, error: Option<&str>) -> Self {
        self.error = Some(error.map(str::to_string));
        self
    }

    pub fn pr_url(mut self, url: &str) -> Self {
        self.pr_url = Some(Some(url.to_string()));
        self
    }

    pub fn stats(mut self, stats: JobStats) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Applies the patch to an in-memory job.
    pub fn apply_to(&self, job: &mut Job) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(ref step) = self.current_step {
            job.current_step = step.clone();
        }
        if let Some(ref error) = self.error {
            job.error = error.clone();
        }
        if let Some(ref url) = self.pr_url {
            job.pr_url = url.clone();
        }
        if let Some(stats) = self.stats {
            job.stats = stats;
        }
    }
}

/// Persistence contract for jobs.
///
/// Every call is atomic on its own. Writes bump `updated_at`.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Verifies the store is configured and reachable.
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// Applies `patch`; fails with [`StoreError::NotFound`] for unknown ids.
    async fn update_fields(&self, id: &str, patch: JobPatch) -> Result<(), StoreError>;

    /// Appends to the job's log without rewriting earlier entries.
    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<(), StoreError>;

    /// Applies `patch` only if the job's status is one of `from`. Returns
    /// whether the patch was applied.
    async fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        patch: JobPatch,
    ) -> Result<bool, StoreError>;
}
