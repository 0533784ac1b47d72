//! Status transitions shared by the runner and the job trigger surface.
//!
//! Every transition is a conditional [`JobStore::transition`], so a job can
//! only be claimed by one run and a terminal status written by a canceller is
//! never overwritten by the run it cancelled.

use super::{JobPatch, JobStore, StoreError};
use crate::job::{Job, JobStatus, NewJob};

/// Error text stored on a job stopped by its owner.
pub const CANCELLED_BY_USER: &str = "Cancelled by user.";

/// Creates and persists a pending job.
pub async fn create_job(store: &dyn JobStore, request: NewJob) -> Result<Job, StoreError> {
    let job = Job::create(request).map_err(|e| StoreError::Conflict(e.to_string()))?;
    store.insert(&job).await?;
    tracing::info!(job_id = %job.id, repo = %job.full_name(), "Job created");
    Ok(job)
}

/// Moves a pending job to running. Returns false when another caller got
/// there first or the job is not pending.
pub async fn claim_for_run(store: &dyn JobStore, job_id: &str) -> Result<bool, StoreError> {
    store
        .transition(
            job_id,
            &[JobStatus::Pending],
            JobPatch::new()
                .status(JobStatus::Running)
                .current_step(None)
                .error(None),
        )
        .await
}

/// Records the end of a run. Only applies while the job is still running.
pub async fn finish_run(
    store: &dyn JobStore,
    job_id: &str,
    status: JobStatus,
    error: Option<&str>,
) -> Result<bool, StoreError> {
    store
        .transition(
            job_id,
            &[JobStatus::Running],
            JobPatch::new().status(status).error(error),
        )
        .await
}

/// Moves a failed or cancelled job back to pending and clears its error.
pub async fn reset_for_retry(store: &dyn JobStore, job_id: &str) -> Result<bool, StoreError> {
    store
        .transition(
            job_id,
            &[JobStatus::Failed, JobStatus::Cancelled],
            JobPatch::new()
                .status(JobStatus::Pending)
                .current_step(None)
                .error(None),
        )
        .await
}

/// Prepares a job for a (re)run: failed or cancelled jobs go back to
/// pending, pending jobs are returned as-is, anything else is refused.
pub async fn prepare_run(store: &dyn JobStore, job_id: &str) -> Result<Job, StoreError> {
    let job = store
        .get_by_id(job_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

    if matches!(job.status, JobStatus::Failed | JobStatus::Cancelled)
        && reset_for_retry(store, job_id).await?
    {
        tracing::info!(job_id, previous = %job.status, "Job reset for retry");
    }

    let job = store
        .get_by_id(job_id)
        .await?
        .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
    if job.status != JobStatus::Pending {
        return Err(StoreError::Conflict(format!(
            "Job is already {}, not starting again.",
            job.status
        )));
    }
    Ok(job)
}

/// Asks a running job to stop. The run observes it before its next step.
pub async fn request_cancel(store: &dyn JobStore, job_id: &str) -> Result<(), StoreError> {
    let applied = store
        .transition(
            job_id,
            &[JobStatus::Running],
            JobPatch::new()
                .status(JobStatus::Cancelled)
                .error(Some(CANCELLED_BY_USER))
                .current_step(None),
        )
        .await?;
    if applied {
        tracing::info!(job_id, "Cancellation requested");
        return Ok(());
    }

    match store.get_by_id(job_id).await? {
        Some(job) => Err(StoreError::Conflict(format!(
            "Job is {}, cannot stop.",
            job.status
        ))),
        None => Err(StoreError::NotFound(job_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;

    async fn seeded(status: JobStatus) -> (MemoryJobStore, Job) {
        let store = MemoryJobStore::new();
        let mut job = Job::create(NewJob::new("https://github.com/acme/web")).unwrap();
        job.status = status;
        if status == JobStatus::Failed {
            job.error = Some("Clone failed".to_string());
        }
        store.insert(&job).await.unwrap();
        (store, job)
    }

    #[tokio::test]
    async fn test_create_job_persists_pending() {
        let store = MemoryJobStore::new();
        let job = create_job(&store, NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();
        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_create_job_rejects_bad_url() {
        let store = MemoryJobStore::new();
        let err = create_job(&store, NewJob::new("not a url")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert!(store.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_claim_only_once() {
        let (store, job) = seeded(JobStatus::Pending).await;
        assert!(claim_for_run(&store, &job.id).await.unwrap());
        assert!(!claim_for_run(&store, &job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_finish_does_not_overwrite_cancelled() {
        let (store, job) = seeded(JobStatus::Cancelled).await;
        let applied = finish_run(&store, &job.id, JobStatus::Failed, Some("late error"))
            .await
            .unwrap();
        assert!(!applied);
        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_reset_for_retry_only_from_terminal_failure() {
        let (store, job) = seeded(JobStatus::Cancelled).await;
        assert!(reset_for_retry(&store, &job.id).await.unwrap());
        assert!(!reset_for_retry(&store, &job.id).await.unwrap());

        let (store, job) = seeded(JobStatus::Completed).await;
        assert!(!reset_for_retry(&store, &job.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_prepare_run_resets_failed_job() {
        let (store, job) = seeded(JobStatus::Failed).await;
        let ready = prepare_run(&store, &job.id).await.unwrap();
        assert_eq!(ready.status, JobStatus::Pending);
        assert!(ready.error.is_none());
    }

    #[tokio::test]
    async fn test_prepare_run_refuses_running_and_completed() {
        for status in [JobStatus::Running, JobStatus::Completed] {
            let (store, job) = seeded(status).await;
            let err = prepare_run(&store, &job.id).await.unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("Job is already {}, not starting again.", status)
            );
        }
    }

    #[tokio::test]
    async fn test_request_cancel_running_job() {
        let (store, job) = seeded(JobStatus::Running).await;
        store
            .update_fields(&job.id, JobPatch::new().current_step(Some("scan")))
            .await
            .unwrap();

        request_cancel(&store, &job.id).await.unwrap();

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error.as_deref(), Some(CANCELLED_BY_USER));
        assert!(stored.current_step.is_none());
    }

    #[tokio::test]
    async fn test_request_cancel_refuses_idle_job() {
        let (store, job) = seeded(JobStatus::Pending).await;
        let err = request_cancel(&store, &job.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Job is pending, cannot stop.");

        let err = request_cancel(&store, "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
