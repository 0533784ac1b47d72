use async_trait::async_trait;
use serde_json::json;

use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, Step, StepError, StepName};

const STEP: &str = "translate";

/// Runs the translation CLI to produce target-locale message files.
pub struct TranslateStep;

#[async_trait]
impl Step for TranslateStep {
    fn name(&self) -> StepName {
        StepName::Translate
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let Some(key) = ctx.translator_key.clone() else {
            ctx.logger
                .warning(
                    STEP,
                    "LINGODOTDEV_API_KEY is not set; skipping Lingo.dev CLI translation step.",
                )
                .await?;
            return Ok(());
        };

        ctx.logger
            .info(STEP, "Running Lingo.dev CLI to generate translated locale files.")
            .await?;

        let output = ctx
            .translator
            .run(&ctx.repo_dir, &key)
            .await
            .map_err(|e| StepError::Command(e.to_string()))?;

        if !output.success() {
            let code = output.code.unwrap_or(1);
            ctx.logger
                .error(
                    STEP,
                    format!(
                        "Lingo.dev CLI failed with code {}: {}",
                        code,
                        output.diagnostic_output()
                    ),
                )
                .await?;
            return Err(StepError::Command(format!(
                "Lingo.dev CLI failed with code {}",
                code
            )));
        }

        let languages = ctx.target_languages.len();
        ctx.stats.languages_added += languages as u64;
        ctx.logger.update_stats(ctx.stats).await?;

        ctx.logger
            .log(
                LogEntry::new(
                    STEP,
                    LogLevel::Success,
                    format!(
                        "Translated locale files for {} languages via Lingo.dev.",
                        languages
                    ),
                )
                .with_data(json!({ "languagesCount": languages })),
            )
            .await?;
        Ok(())
    }
}
