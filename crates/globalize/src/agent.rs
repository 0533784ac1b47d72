//! Process-level wiring: one store, one pipeline, and the runs launched on
//! them.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::config::AgentConfig;
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, GlobalizeError, Result};
use crate::job::{Job, NewJob};
use crate::pipeline::{Credentials, Pipeline, PipelineError, RunOutcome};
use crate::store::{lifecycle, JobStore, SqliteJobStore};

/// Owns the job store and pipeline for the lifetime of the process.
///
/// Build it once with [`Agent::init`], start runs with [`Agent::start`], and
/// call [`Agent::shutdown`] before exiting so in-flight runs can record
/// their outcome.
pub struct Agent {
    store: Arc<dyn JobStore>,
    pipeline: Arc<Pipeline>,
    runs: Mutex<JoinSet<()>>,
    shutdown: AtomicBool,
}

impl Agent {
    /// Opens the SQLite database and builds the production pipeline.
    pub fn init(config: &AgentConfig) -> Result<Self> {
        let path = match &config.database_path {
            Some(path) => PathBuf::from(path),
            None => default_database_path().ok_or_else(|| ConfigError::Validation {
                message: "Could not determine a home directory; set databasePath".to_string(),
            })?,
        };
        let db = Database::open(&path)?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(db));
        let pipeline = Pipeline::from_config(store.clone(), config)?;

        info!(
            database = %path.display(),
            work_root = %pipeline.settings().work_root.display(),
            "Agent initialized"
        );
        Ok(Self::with_pipeline(store, pipeline))
    }

    /// Agent over an already built store and pipeline.
    pub fn with_pipeline(store: Arc<dyn JobStore>, pipeline: Pipeline) -> Self {
        Self {
            store,
            pipeline: Arc::new(pipeline),
            runs: Mutex::new(JoinSet::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub async fn create_job(&self, request: NewJob) -> Result<Job> {
        Ok(lifecycle::create_job(self.store.as_ref(), request).await?)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        Ok(self.store.get_by_id(job_id).await?)
    }

    /// Runs the job to completion on the current task. Failed and cancelled
    /// jobs are reset to pending first.
    pub async fn run(&self, job_id: &str, credentials: Credentials) -> Result<RunOutcome> {
        self.ensure_accepting()?;
        let job = lifecycle::prepare_run(self.store.as_ref(), job_id).await?;
        Ok(self.pipeline.run(job, credentials).await?)
    }

    /// Launches the job in the background and returns the pending job.
    /// The run's outcome is recorded on the job itself.
    pub async fn start(&self, job_id: &str, credentials: Credentials) -> Result<Job> {
        self.ensure_accepting()?;
        let job = lifecycle::prepare_run(self.store.as_ref(), job_id).await?;

        let pipeline = self.pipeline.clone();
        let launched = job.clone();
        let mut runs = self.runs.lock().await;
        // Shutdown may have drained the set while this call waited for it.
        self.ensure_accepting()?;
        // Reap finished runs so the set only tracks live ones.
        while runs.try_join_next().is_some() {}
        runs.spawn(async move {
            let job_id = launched.id.clone();
            match pipeline.run(launched, credentials).await {
                Ok(outcome) => info!(job_id, ?outcome, "Run finished"),
                Err(PipelineError::AlreadyActive(message)) => warn!(job_id, "{}", message),
                Err(e) => error!(job_id, step = e.step(), error = %e, "Run failed"),
            }
        });
        Ok(job)
    }

    /// Asks a running job to stop before its next step.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        Ok(lifecycle::request_cancel(self.store.as_ref(), job_id).await?)
    }

    /// Refuses new runs and waits for the ones in flight.
    pub async fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let mut runs = self.runs.lock().await;
        info!(in_flight = runs.len(), "Shutting down agent...");
        while let Some(result) = runs.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Run task panicked");
            }
        }
        info!("All runs have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn ensure_accepting(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(GlobalizeError::ShuttingDown);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use crate::pipeline::{PipelineConfig, StepName, StepRegistry};
    use crate::store::{MemoryJobStore, StoreCancellation, StoreError};
    use crate::test_support::{collaborators, ScriptedStep};

    fn agent_with(steps: StepRegistry) -> (Agent, Arc<MemoryJobStore>) {
        let store = Arc::new(MemoryJobStore::new());
        let settings = Arc::new(PipelineConfig {
            work_root: std::env::temp_dir().join("globalize-agent-tests"),
            ..PipelineConfig::default()
        });
        let pipeline = Pipeline::new(
            store.clone(),
            Arc::new(StoreCancellation::new(store.clone())),
            collaborators(),
            steps,
            settings,
        );
        (Agent::with_pipeline(store.clone(), pipeline), store)
    }

    fn scripted(fail_at: Option<StepName>) -> StepRegistry {
        StepName::ORDER
            .into_iter()
            .fold(StepRegistry::new(), |registry, name| {
                let step = match fail_at {
                    Some(failing) if failing == name => ScriptedStep::fail(name, "Scan failed"),
                    _ => ScriptedStep::ok(name),
                };
                registry.replace(Arc::new(step))
            })
    }

    #[tokio::test]
    async fn test_run_completes_job() {
        let (agent, _) = agent_with(scripted(None));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();

        let outcome = agent.run(&job.id, Credentials::default()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        let stored = agent.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_job_can_be_retried() {
        let (agent, store) = agent_with(scripted(Some(StepName::Scan)));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();

        let err = agent.run(&job.id, Credentials::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Pipeline error: Scan failed");
        let failed = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(failed.status, JobStatus::Failed);

        // The retry resets the job and runs it again; earlier logs are kept.
        let _ = agent.run(&job.id, Credentials::default()).await;
        let retried = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(retried.status, JobStatus::Failed);
        assert_eq!(retried.logs.iter().filter(|e| e.step == "pipeline").count(), 2);
        assert_eq!(
            retried.logs.iter().filter(|e| e.message == "Starting step: clone").count(),
            2
        );
    }

    #[tokio::test]
    async fn test_start_runs_in_background_and_shutdown_waits() {
        let (agent, store) = agent_with(scripted(None));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();

        let launched = agent.start(&job.id, Credentials::default()).await.unwrap();
        assert_eq!(launched.id, job.id);
        agent.shutdown().await;

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(agent.is_shutdown());
    }

    #[tokio::test]
    async fn test_completed_job_is_not_rerun() {
        let (agent, _) = agent_with(scripted(None));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();
        agent.run(&job.id, Credentials::default()).await.unwrap();

        let err = agent.run(&job.id, Credentials::default()).await.unwrap_err();
        assert!(matches!(err, GlobalizeError::Store(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cancel_requires_running_job() {
        let (agent, _) = agent_with(scripted(None));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();
        let err = agent.cancel(&job.id).await.unwrap_err();
        assert_eq!(err.to_string(), "Job store error: Job is pending, cannot stop.");
    }

    #[tokio::test]
    async fn test_no_runs_after_shutdown() {
        let (agent, _) = agent_with(scripted(None));
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();
        agent.shutdown().await;

        let err = agent.start(&job.id, Credentials::default()).await.unwrap_err();
        assert!(matches!(err, GlobalizeError::ShuttingDown));
    }

    #[tokio::test]
    async fn test_start_waiting_on_shutdown_is_refused() {
        let (agent, store) = agent_with(scripted(None));
        let agent = Arc::new(agent);
        let job = agent
            .create_job(NewJob::new("https://github.com/acme/web"))
            .await
            .unwrap();

        let held = agent.runs.lock().await;
        let starting = tokio::spawn({
            let agent = agent.clone();
            let job_id = job.id.clone();
            async move { agent.start(&job_id, Credentials::default()).await }
        });
        // Let the start call pass its first check and block on the run set.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        agent.shutdown.store(true, Ordering::SeqCst);
        drop(held);

        let err = starting.await.unwrap().unwrap_err();
        assert!(matches!(err, GlobalizeError::ShuttingDown));
        assert!(agent.runs.lock().await.is_empty());
        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
    }

    #[test]
    fn test_init_with_sqlite_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = crate::config::load_config_from_str(&format!(
            r#"{{
                "databasePath": "{}",
                "github": {{"tokenEnvVar": ""}},
                "rewriter": {{"apiKeyEnvVar": ""}},
                "translator": {{"apiKeyEnvVar": ""}}
            }}"#,
            dir.path().join("data").join("jobs.db").display()
        ))
        .unwrap();

        let agent = Agent::init(&config).unwrap();
        assert!(!agent.is_shutdown());
        assert!(dir.path().join("data").join("jobs.db").exists());
    }
}
