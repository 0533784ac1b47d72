use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use tokio::fs;
use tracing::debug;

use crate::framework::scaffold::validate_next_app_router;
use crate::framework::{adapter_key, detect_remote, DetectedFramework, FrameworkAdapter};
use crate::github::{embed_token, parse_repo_url};
use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, Step, StepError, StepName};
use crate::sanitize::redact_repo_url;

const STEP: &str = "clone";

/// Clones the repository into the run's working directory and checks that it
/// is a project the pipeline can handle.
pub struct CloneStep;

#[async_trait]
impl Step for CloneStep {
    fn name(&self) -> StepName {
        StepName::Clone
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let started = Instant::now();
        ctx.git.ensure_available().await?;

        fs::create_dir_all(&ctx.work_dir)
            .await
            .map_err(|e| StepError::io("Failed to create working directory", e))?;
        if fs::try_exists(&ctx.repo_dir).await.unwrap_or(false) {
            debug!(dir = %ctx.repo_dir.display(), "Removing stale checkout");
            fs::remove_dir_all(&ctx.repo_dir)
                .await
                .map_err(|e| StepError::io("Failed to remove previous checkout", e))?;
        }

        let repo_url = ctx.job.repo_url.clone();
        let clone_url = match &ctx.github_token {
            Some(token) => embed_token(&repo_url, token.expose_secret()),
            None => repo_url.clone(),
        };

        ctx.logger
            .info(
                STEP,
                format!(
                    "Cloning {} into {}",
                    redact_repo_url(&repo_url),
                    ctx.repo_dir.display()
                ),
            )
            .await?;

        ctx.git
            .clone_repo(&clone_url, &ctx.repo_dir, ctx.settings.clone_depth)
            .await?;

        validate_framework(ctx).await?;

        let duration_ms = started.elapsed().as_millis() as u64;
        let framework = ctx.detected_framework.as_ref().map(|f| f.name.clone());
        ctx.logger
            .log(
                LogEntry::new(
                    STEP,
                    LogLevel::Success,
                    format!(
                        "Cloned repository and validated framework in {}ms",
                        duration_ms
                    ),
                )
                .with_data(json!({
                    "repoPath": ctx.repo_dir.display().to_string(),
                    "framework": framework,
                })),
            )
            .await?;
        Ok(())
    }
}

/// Picks an adapter from remote detection when possible, otherwise applies
/// the structural App Router check.
async fn validate_framework(ctx: &mut PipelineContext) -> Result<(), StepError> {
    let detected = detect_supported(ctx).await;

    let adapter: Option<Arc<dyn FrameworkAdapter>> = detected
        .as_ref()
        .and_then(|framework| ctx.frameworks.get(&adapter_key(framework)));
    ctx.detected_framework = detected;

    match adapter {
        Some(adapter) => {
            debug!(adapter = adapter.key(), "Validating with framework adapter");
            adapter.validate(&ctx.repo_dir).await?;
            ctx.framework_adapter = Some(adapter);
        }
        None => validate_next_app_router(&ctx.repo_dir).await?,
    }
    Ok(())
}

async fn detect_supported(ctx: &PipelineContext) -> Option<DetectedFramework> {
    if !ctx.has_api_token {
        return None;
    }
    let repo = parse_repo_url(&ctx.job.repo_url)?;
    match detect_remote(ctx.hosting.as_ref(), &repo.owner, &repo.name).await {
        Ok(frameworks) => frameworks.into_iter().find(|f| f.supported),
        Err(e) => {
            debug!(error = %e, "Framework detection failed, using structural check");
            None
        }
    }
}
