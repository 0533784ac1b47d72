use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::AgentConfig;
use crate::error::ConfigError;
use crate::job::{Job, JobStatus, LogEntry, LogLevel};
use crate::store::lifecycle::{self, CANCELLED_BY_USER};
use crate::store::{CancellationProbe, JobPatch, JobStore, StoreCancellation};

use super::collaborators::Collaborators;
use super::config::PipelineConfig;
use super::context::{Credentials, PipelineContext};
use super::error::{PipelineError, StepError};
use super::logger::JobLogger;
use super::step::{StepName, StepRegistry};

/// Step name used for log entries written by the runner itself.
pub const PIPELINE_LOG_STEP: &str = "pipeline";

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Cancellation was observed before a step started.
    Cancelled,
}

pub struct Pipeline {
    store: Arc<dyn JobStore>,
    cancellation: Arc<dyn CancellationProbe>,
    collaborators: Collaborators,
    steps: StepRegistry,
    settings: Arc<PipelineConfig>,
}

impl Pipeline {
    /// Production constructor: real collaborators and steps, cancellation read
    /// from the persisted job status.
    pub fn from_config(store: Arc<dyn JobStore>, config: &AgentConfig) -> Result<Self, ConfigError> {
        let collaborators = Collaborators::from_config(config)?;
        let cancellation = Arc::new(StoreCancellation::new(store.clone()));
        Ok(Self {
            store,
            cancellation,
            collaborators,
            steps: StepRegistry::standard(),
            settings: Arc::new(PipelineConfig::from_config(config)),
        })
    }

    /// Constructor with every part injected.
    pub fn new(
        store: Arc<dyn JobStore>,
        cancellation: Arc<dyn CancellationProbe>,
        collaborators: Collaborators,
        steps: StepRegistry,
        settings: Arc<PipelineConfig>,
    ) -> Self {
        Self {
            store,
            cancellation,
            collaborators,
            steps,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    /// Runs every step for `job`, recording progress on the job as it goes.
    ///
    /// The job must be pending; it is claimed atomically, so a second
    /// concurrent call for the same job fails with
    /// [`PipelineError::AlreadyActive`]. A step failure marks the job failed
    /// and is returned; cancellation is not an error.
    pub async fn run(
        &self,
        job: Job,
        credentials: Credentials,
    ) -> Result<RunOutcome, PipelineError> {
        let span = info_span!("pipeline", job_id = %job.id, repo = %job.full_name());
        self.run_job(job, credentials).instrument(span).await
    }

    async fn run_job(
        &self,
        job: Job,
        credentials: Credentials,
    ) -> Result<RunOutcome, PipelineError> {
        self.store
            .ensure_ready()
            .await
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let hosting_token = credentials
            .token
            .as_ref()
            .or(self.collaborators.fallback_token.as_ref());
        let hosting = self
            .collaborators
            .connector
            .connect(hosting_token)
            .map_err(|e| PipelineError::Configuration(e.to_string()))?;

        let job_id = job.id.clone();
        let logger = JobLogger::new(self.store.clone(), job_id.clone());
        let mut ctx = PipelineContext::new(
            job,
            &credentials,
            hosting,
            &self.collaborators,
            self.settings.clone(),
            logger.clone(),
        );

        if !lifecycle::claim_for_run(self.store.as_ref(), &job_id).await? {
            let current = self
                .store
                .get_by_id(&job_id)
                .await?
                .ok_or_else(|| PipelineError::JobNotFound(job_id.clone()))?;
            return Err(PipelineError::AlreadyActive(format!(
                "Job is already {}, not starting again.",
                current.status
            )));
        }
        info!(languages = ?ctx.target_languages, "Run started");

        match self.execute(&mut ctx).await {
            Ok(outcome) => {
                info!(?outcome, "Run finished");
                Ok(outcome)
            }
            Err(err) => {
                self.record_failure(&logger, &err).await;
                Err(err)
            }
        }
    }

    async fn execute(&self, ctx: &mut PipelineContext) -> Result<RunOutcome, PipelineError> {
        let logger = ctx.logger.clone();

        for name in StepName::ORDER {
            if self.cancellation.is_cancelled(&ctx.job_id).await? {
                logger
                    .info(PIPELINE_LOG_STEP, "Pipeline cancelled by user.")
                    .await?;
                self.record_cancellation(&ctx.job_id).await?;
                return Ok(RunOutcome::Cancelled);
            }

            let step = self.steps.get(name).cloned().ok_or_else(|| {
                PipelineError::Configuration(format!("no step registered for {}", name))
            })?;

            let failed = |source: StepError| PipelineError::StepFailed {
                step: name.as_str(),
                source,
            };

            logger
                .set_current_step(Some(name.as_str()))
                .await
                .map_err(|e| failed(e.into()))?;
            logger
                .info(name.as_str(), format!("Starting step: {}", name))
                .await
                .map_err(|e| failed(e.into()))?;

            let started = Instant::now();
            step.run(ctx)
                .instrument(info_span!("step", step = name.as_str()))
                .await
                .map_err(failed)?;
            let duration_ms = started.elapsed().as_millis() as u64;
            debug!(step = name.as_str(), duration_ms, "Step completed");

            logger
                .log(
                    LogEntry::new(
                        name.as_str(),
                        LogLevel::Success,
                        format!("Completed step: {} in {}ms", name, duration_ms),
                    )
                    .with_data(serde_json::json!({ "durationMs": duration_ms })),
                )
                .await
                .map_err(|e| failed(e.into()))?;
        }

        logger.set_current_step(None).await?;
        if !lifecycle::finish_run(self.store.as_ref(), &ctx.job_id, JobStatus::Completed, None)
            .await?
        {
            // Cancelled while the last step ran; the canceller's status stands.
            info!("Job left the running state during the last step");
            return Ok(RunOutcome::Cancelled);
        }
        Ok(RunOutcome::Completed)
    }

    /// Leaves a status written by the canceller untouched; a run stopped
    /// through in-process flags is moved to cancelled here.
    async fn record_cancellation(&self, job_id: &str) -> Result<(), PipelineError> {
        self.store
            .update_fields(job_id, JobPatch::new().current_step(None))
            .await?;
        self.store
            .transition(
                job_id,
                &[JobStatus::Running],
                JobPatch::new()
                    .status(JobStatus::Cancelled)
                    .error(Some(CANCELLED_BY_USER)),
            )
            .await?;
        Ok(())
    }

    async fn record_failure(&self, logger: &JobLogger, err: &PipelineError) {
        let message = err.to_string();
        let job_id = logger.job_id();
        warn!(step = err.step().unwrap_or(PIPELINE_LOG_STEP), error = %message, "Run failed");

        if let Err(e) = logger.error(PIPELINE_LOG_STEP, message.clone()).await {
            warn!(error = %e, "Failed to record pipeline error log");
        }
        if let Err(e) =
            lifecycle::finish_run(self.store.as_ref(), job_id, JobStatus::Failed, Some(&message))
                .await
        {
            warn!(error = %e, "Failed to mark job as failed");
        }
        if let Err(e) = logger.set_current_step(None).await {
            warn!(error = %e, "Failed to clear current step");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::NewJob;
    use crate::store::{CancellationFlags, MemoryJobStore};
    use crate::test_support::{collaborators, ScriptedStep};

    fn settings() -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            work_root: std::env::temp_dir().join("globalize-runner-tests"),
            ..PipelineConfig::default()
        })
    }

    fn scripted_registry() -> StepRegistry {
        StepName::ORDER
            .into_iter()
            .fold(StepRegistry::new(), |registry, name| {
                registry.replace(Arc::new(ScriptedStep::ok(name)))
            })
    }

    async fn pending_job(store: &MemoryJobStore) -> Job {
        let job = Job::create(
            NewJob::new("https://github.com/acme/web").with_languages(["es", "fr"]),
        )
        .unwrap();
        store.insert(&job).await.unwrap();
        job
    }

    fn pipeline(
        store: Arc<MemoryJobStore>,
        cancellation: Arc<dyn CancellationProbe>,
        steps: StepRegistry,
    ) -> Pipeline {
        Pipeline::new(store, cancellation, collaborators(), steps, settings())
    }

    fn log_pairs(job: &Job) -> Vec<String> {
        job.logs
            .iter()
            .map(|e| format!("{}:{}", e.step, e.level.as_str()))
            .collect()
    }

    // ── Success ──

    #[tokio::test]
    async fn test_all_steps_succeed() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        let cancellation = Arc::new(StoreCancellation::new(store.clone()));
        let pipeline = pipeline(store.clone(), cancellation, scripted_registry());

        let outcome = pipeline.run(job.clone(), Credentials::default()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Completed);

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.current_step, None);
        assert_eq!(stored.error, None);
        assert_eq!(
            log_pairs(&stored),
            vec![
                "clone:info",
                "clone:success",
                "scan:info",
                "scan:success",
                "setup-i18n:info",
                "setup-i18n:success",
                "transform:info",
                "transform:success",
                "translate:info",
                "translate:success",
                "commit-push:info",
                "commit-push:success",
                "open-pr:info",
                "open-pr:success",
            ]
        );
        assert_eq!(stored.logs[0].message, "Starting step: clone");
        assert!(stored.logs[1].message.starts_with("Completed step: clone in "));
        assert!(stored.logs[1].data.as_ref().unwrap()["durationMs"].is_u64());
    }

    // ── Failure ──

    #[tokio::test]
    async fn test_failing_step_stops_run() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        let steps = scripted_registry().replace(Arc::new(ScriptedStep::fail(
            StepName::Clone,
            "Clone failed",
        )));
        let cancellation = Arc::new(StoreCancellation::new(store.clone()));
        let pipeline = pipeline(store.clone(), cancellation, steps);

        let err = pipeline
            .run(job.clone(), Credentials::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Clone failed");
        assert_eq!(err.step(), Some("clone"));

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.error.as_deref(), Some("Clone failed"));
        assert_eq!(stored.current_step, None);
        assert_eq!(log_pairs(&stored), vec!["clone:info", "pipeline:error"]);
        assert_eq!(stored.logs[1].message, "Clone failed");
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_before_any_mutation() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        store.set_unavailable(true);
        let cancellation = Arc::new(CancellationFlags::new());
        let pipeline = pipeline(store.clone(), cancellation, scripted_registry());

        let err = pipeline
            .run(job.clone(), Credentials::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));

        store.set_unavailable(false);
        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Pending);
        assert!(stored.logs.is_empty());
    }

    // ── Claiming ──

    #[tokio::test]
    async fn test_running_job_is_not_started_again() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        lifecycle::claim_for_run(store.as_ref(), &job.id).await.unwrap();
        let cancellation = Arc::new(CancellationFlags::new());
        let pipeline = pipeline(store.clone(), cancellation, scripted_registry());

        let err = pipeline
            .run(job.clone(), Credentials::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Job is already running, not starting again.");

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Running);
        assert!(stored.logs.is_empty());
    }

    // ── Cancellation ──

    #[tokio::test]
    async fn test_cancellation_before_step_stops_cleanly() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        let cancellation = Arc::new(StoreCancellation::new(store.clone()));
        // Scan cancels the job the way an operator would mid-run.
        let steps = scripted_registry().replace(Arc::new(ScriptedStep::cancel_job(
            StepName::Scan,
            store.clone(),
        )));
        let pipeline = pipeline(store.clone(), cancellation, steps);

        let outcome = pipeline.run(job.clone(), Credentials::default()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error.as_deref(), Some(CANCELLED_BY_USER));
        assert_eq!(stored.current_step, None);
        assert_eq!(
            log_pairs(&stored),
            vec![
                "clone:info",
                "clone:success",
                "scan:info",
                "scan:success",
                "pipeline:info",
            ]
        );
        assert!(stored.logs.iter().all(|e| e.step != "setup-i18n"));
    }

    #[tokio::test]
    async fn test_cancellation_during_last_step_reports_cancelled() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        let cancellation = Arc::new(StoreCancellation::new(store.clone()));
        let steps = scripted_registry().replace(Arc::new(ScriptedStep::cancel_job(
            StepName::OpenPr,
            store.clone(),
        )));
        let pipeline = pipeline(store.clone(), cancellation, steps);

        let outcome = pipeline.run(job.clone(), Credentials::default()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error.as_deref(), Some(CANCELLED_BY_USER));
        assert_eq!(stored.current_step, None);
    }

    #[tokio::test]
    async fn test_in_process_flag_cancels_running_job() {
        let store = Arc::new(MemoryJobStore::new());
        let job = pending_job(&store).await;
        let flags = Arc::new(CancellationFlags::new());
        flags.cancel(&job.id);
        let pipeline = pipeline(store.clone(), flags, scripted_registry());

        let outcome = pipeline.run(job.clone(), Credentials::default()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Cancelled);

        let stored = store.get_by_id(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(log_pairs(&stored), vec!["pipeline:info"]);
        assert_eq!(stored.logs[0].message, "Pipeline cancelled by user.");
    }
}
