use async_trait::async_trait;
use serde_json::json;
use tokio::fs;
use tracing::debug;

use crate::framework::scaffold::default_transform_rules;
use crate::job::{LogEntry, LogLevel};
use crate::llm::{build_transform_prompt, parse_with_repairs, TransformRequest, TransformResponse};
use crate::pipeline::{MessageCatalog, PipelineContext, Step, StepError, StepName};

const STEP: &str = "transform";

/// Rewrites every file with hits to use translation keys and collects the
/// extracted source messages.
pub struct TransformStep;

#[async_trait]
impl Step for TransformStep {
    fn name(&self) -> StepName {
        StepName::Transform
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let Some(rewriter) = ctx.rewriter.clone() else {
            ctx.logger
                .warning(
                    STEP,
                    "No code rewriter is configured; skipping automatic string wrapping and extraction.",
                )
                .await?;
            return Ok(());
        };

        load_existing_catalog(ctx).await?;

        let instructions = ctx
            .framework_adapter
            .as_ref()
            .map(|a| a.transform_rules())
            .unwrap_or_else(default_transform_rules);
        let files: Vec<_> = ctx
            .string_hits_by_file
            .iter()
            .map(|(path, hits)| (path.clone(), hits.clone()))
            .collect();
        let total_files = files.len();

        let mut files_modified = 0usize;
        let mut total_strings = 0usize;
        for (relative, hits) in files {
            total_strings += hits.len();
            let path = ctx.repo_path(&relative);
            let display_path = relative.to_string_lossy().replace('\\', "/");
            let code = fs::read_to_string(&path)
                .await
                .map_err(|e| StepError::io(format!("Failed to read {}", display_path), e))?;

            let prompt = build_transform_prompt(&TransformRequest {
                relative_path: &display_path,
                code: &code,
                hits: &hits,
                instructions: &instructions,
            });
            debug!(file = %display_path, hits = hits.len(), "Requesting rewrite");
            let raw = rewriter.generate_content(&prompt).await?;

            let response: TransformResponse = match parse_with_repairs(&raw) {
                Ok(response) => response,
                Err(e) => {
                    ctx.logger
                        .log(
                            LogEntry::new(
                                STEP,
                                LogLevel::Warning,
                                format!(
                                    "Failed to parse rewrite response for {} after multiple attempts. Skipping file.",
                                    display_path
                                ),
                            )
                            .with_data(json!({
                                "error": e.message,
                                "jsonPreview": e.preview,
                            })),
                        )
                        .await?;
                    continue;
                }
            };

            fs::write(&path, &response.file_content)
                .await
                .map_err(|e| StepError::io(format!("Failed to write {}", display_path), e))?;
            files_modified += 1;
            let added = ctx.source_messages.merge(response.messages);
            debug!(file = %display_path, added, "Merged extracted messages");

            ctx.logger
                .log(
                    LogEntry::new(
                        STEP,
                        LogLevel::Info,
                        format!("Transformed {}/{} files.", files_modified, total_files),
                    )
                    .with_data(json!({
                        "completedFiles": files_modified,
                        "totalFiles": total_files,
                        "stringsExtracted": total_strings,
                    })),
                )
                .await?;
        }

        write_catalog(ctx).await?;

        ctx.stats.strings_found += total_strings as u64;
        ctx.stats.files_modified += files_modified as u64;
        ctx.logger.update_stats(ctx.stats).await?;

        ctx.logger
            .log(
                LogEntry::new(
                    STEP,
                    LogLevel::Success,
                    format!(
                        "Transformed {} files and extracted {} translation keys.",
                        files_modified, total_strings
                    ),
                )
                .with_data(json!({
                    "completedFiles": files_modified,
                    "totalFiles": total_files,
                    "stringsExtracted": total_strings,
                })),
            )
            .await?;
        Ok(())
    }
}

/// Seeds the run's catalog with the repository's existing source messages,
/// which take precedence over anything extracted in this run.
async fn load_existing_catalog(ctx: &mut PipelineContext) -> Result<(), StepError> {
    let path = ctx.source_catalog_path();
    let raw = match fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StepError::io("Failed to read source catalog", e)),
    };
    match MessageCatalog::from_json(&raw) {
        Ok(mut existing) => {
            let extracted = std::mem::take(&mut ctx.source_messages);
            existing.merge(extracted);
            ctx.source_messages = existing;
        }
        Err(e) => {
            ctx.logger
                .warning(
                    STEP,
                    format!(
                        "Existing source catalog is not valid JSON, starting from an empty one: {}",
                        e
                    ),
                )
                .await?;
        }
    }
    Ok(())
}

async fn write_catalog(ctx: &PipelineContext) -> Result<(), StepError> {
    let path = ctx.source_catalog_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .await
            .map_err(|e| StepError::io("Failed to create messages directory", e))?;
    }
    let json = ctx
        .source_messages
        .to_pretty_json()
        .map_err(|e| StepError::Command(format!("Failed to serialize messages: {}", e)))?;
    fs::write(&path, json)
        .await
        .map_err(|e| StepError::io("Failed to write source catalog", e))
}
