use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use super::{JobPatch, JobStore, StoreError};
use crate::db::job_repo::{self, JobChanges, JobFilter, JobRow};
use crate::db::Database;
use crate::job::{Job, JobStatus, LogEntry};

/// Job store backed by the SQLite [`Database`].
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Lists jobs matching `filter`, newest first, with the total match count.
    pub fn list(&self, filter: &JobFilter) -> Result<(Vec<Job>, u64), StoreError> {
        let (rows, total) = job_repo::query(&self.db, filter)?;
        let jobs = rows
            .into_iter()
            .map(row_to_job)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((jobs, total))
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn corrupt(id: &str, reason: impl ToString) -> StoreError {
    StoreError::Corrupt {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_timestamp(id: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| corrupt(id, format!("bad timestamp '{}': {}", value, e)))
}

fn row_to_job(row: JobRow) -> Result<Job, StoreError> {
    let id = row.id;
    let status = JobStatus::parse(&row.status)
        .ok_or_else(|| corrupt(&id, format!("unknown status '{}'", row.status)))?;

    Ok(Job {
        languages: serde_json::from_str(&row.languages).map_err(|e| corrupt(&id, e))?,
        stats: serde_json::from_str(&row.stats).map_err(|e| corrupt(&id, e))?,
        logs: serde_json::from_str(&row.logs).map_err(|e| corrupt(&id, e))?,
        created_at: parse_timestamp(&id, &row.created_at)?,
        updated_at: parse_timestamp(&id, &row.updated_at)?,
        user_id: row.user_id,
        github_username: row.github_username,
        repo_url: row.repo_url,
        repo_owner: row.repo_owner,
        repo_name: row.repo_name,
        status,
        current_step: row.current_step,
        pr_url: row.pr_url,
        error: row.error,
        id,
    })
}

fn job_to_row(job: &Job) -> Result<JobRow, StoreError> {
    Ok(JobRow {
        id: job.id.clone(),
        user_id: job.user_id.clone(),
        github_username: job.github_username.clone(),
        repo_url: job.repo_url.clone(),
        repo_owner: job.repo_owner.clone(),
        repo_name: job.repo_name.clone(),
        languages: serde_json::to_string(&job.languages)?,
        status: job.status.as_str().to_string(),
        current_step: job.current_step.clone(),
        pr_url: job.pr_url.clone(),
        stats: serde_json::to_string(&job.stats)?,
        logs: serde_json::to_string(&job.logs)?,
        error: job.error.clone(),
        created_at: timestamp(job.created_at),
        updated_at: timestamp(job.updated_at),
    })
}

fn patch_to_changes(patch: JobPatch) -> Result<JobChanges, StoreError> {
    Ok(JobChanges {
        status: patch.status.map(|s| s.as_str().to_string()),
        current_step: patch.current_step,
        error: patch.error,
        pr_url: patch.pr_url,
        stats: patch.stats.map(|s| serde_json::to_string(&s)).transpose()?,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn ensure_ready(&self) -> Result<(), StoreError> {
        self.db.ping().map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        job_repo::insert(&self.db, &job_to_row(job)?)?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Job>, StoreError> {
        job_repo::find_by_id(&self.db, id)?
            .map(row_to_job)
            .transpose()
    }

    async fn update_fields(&self, id: &str, patch: JobPatch) -> Result<(), StoreError> {
        let changes = patch_to_changes(patch)?;
        match job_repo::update_fields(&self.db, id, &changes, &timestamp(Utc::now()))? {
            0 => Err(StoreError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn append_log(&self, id: &str, entry: LogEntry) -> Result<(), StoreError> {
        let entry_json = serde_json::to_string(&entry)?;
        match job_repo::append_log(&self.db, id, &entry_json, &timestamp(Utc::now()))? {
            0 => Err(StoreError::NotFound(id.to_string())),
            _ => Ok(()),
        }
    }

    async fn transition(
        &self,
        id: &str,
        from: &[JobStatus],
        patch: JobPatch,
    ) -> Result<bool, StoreError> {
        let expected: Vec<&str> = from.iter().map(JobStatus::as_str).collect();
        let changes = patch_to_changes(patch)?;
        Ok(job_repo::transition(
            &self.db,
            id,
            &expected,
            &changes,
            &timestamp(Utc::now()),
        )?)
    }
}
