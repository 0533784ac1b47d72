use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{JobStore, StoreError};
use crate::job::JobStatus;

/// Answers whether a job has been asked to stop. The runner polls it before
/// every step.
#[async_trait]
pub trait CancellationProbe: Send + Sync {
    async fn is_cancelled(&self, job_id: &str) -> Result<bool, StoreError>;
}

/// Reads the persisted status: a job is cancelled once a canceller has moved
/// it to `cancelled`.
pub struct StoreCancellation {
    store: Arc<dyn JobStore>,
}

impl StoreCancellation {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CancellationProbe for StoreCancellation {
    async fn is_cancelled(&self, job_id: &str) -> Result<bool, StoreError> {
        let job = self.store.get_by_id(job_id).await?;
        Ok(matches!(job, Some(job) if job.status == JobStatus::Cancelled))
    }
}

/// In-process cancellation flags.
#[derive(Debug, Default)]
pub struct CancellationFlags {
    cancelled: Mutex<HashSet<String>>,
}

impl CancellationFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, job_id: &str) {
        if let Ok(mut set) = self.cancelled.lock() {
            set.insert(job_id.to_string());
        }
    }

    pub fn clear(&self, job_id: &str) {
        if let Ok(mut set) = self.cancelled.lock() {
            set.remove(job_id);
        }
    }
}

#[async_trait]
impl CancellationProbe for CancellationFlags {
    async fn is_cancelled(&self, job_id: &str) -> Result<bool, StoreError> {
        let set = self
            .cancelled
            .lock()
            .map_err(|_| StoreError::Unavailable("cancellation flags poisoned".to_string()))?;
        Ok(set.contains(job_id))
    }
}
