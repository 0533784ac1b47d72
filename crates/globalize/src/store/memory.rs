use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;

use super::{JobPatch, JobStore, StoreError};
use crate::job::{Job, JobStatus, LogEntry};

/// Job store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, Job>>,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of all stored jobs.
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs
            .read()
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn with_job<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Job) -> T,
    ) -> Result<Option<T>, StoreError> {
        self.check_available()?;
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| StoreError::Unavailable("job map poisoned".to_string()))?;
        Ok(jobs.get_mut(id).map(f))
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.check_available()
    }

    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        self.check_available()?;
        let mut jobs = self
            .jobs
            .write()
            .map_err(|_| StoreError::Unavailable("job map poisoned".to_string()))?;
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>, StoreError> {
        self.check_available()?;
        let jobs = self
            .jobs
            .read()
            .map_err(|_| StoreError::Unavailable("job map poisoned".to_string()))?;
        Ok(jobs.get(id).cloned())
    }

    async fn update_fields(&self, id: &str, patch: JobPatch) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            patch.apply_to(job);
            job.updated_at = Utc::now();
        })?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.logs.push(entry);
            job.updated_at = Utc::now();
        })?
        .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        patch: JobPatch,
    ) -> Result<bool, StoreError> {
        let applied = self.with_job(id, |job| {
            if !from.contains(&job.status) {
                return false;
            }
            patch.apply_to(job);
            job.updated_at = Utc::now();
            true
        })?;
        Ok(applied.unwrap_or(false))
    }
}
