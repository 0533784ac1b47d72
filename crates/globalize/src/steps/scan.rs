use async_trait::async_trait;
use serde_json::json;
use tokio::fs;
use tracing::debug;

use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, Step, StepError, StepName};
use crate::scanner::{
    discover_source_files, scan_source, HitRules, SourceFilter, DEFAULT_TRANSLATABLE_ATTRIBUTES,
};

/// Scanned when no framework adapter was selected.
pub const DEFAULT_SOURCE_DIRS: &[&str] = &["app", "components"];
pub const DEFAULT_SOURCE_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js"];

/// Collects hardcoded user-facing strings per source file.
pub struct ScanStep;

#[async_trait]
impl Step for ScanStep {
    fn name(&self) -> StepName {
        StepName::Scan
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let filter = match &ctx.framework_adapter {
            Some(adapter) => SourceFilter::under_roots(&adapter.source_dirs(), &adapter.file_patterns()),
            None => SourceFilter::for_roots(DEFAULT_SOURCE_DIRS, DEFAULT_SOURCE_EXTENSIONS),
        };
        let rules = HitRules {
            translation_fn: ctx.settings.translation_fn.clone(),
            attributes: DEFAULT_TRANSLATABLE_ATTRIBUTES
                .iter()
                .map(|a| a.to_string())
                .collect(),
        };

        let files = discover_source_files(&ctx.repo_dir, &filter);
        debug!(candidates = files.len(), "Scanning source files");

        let mut total_strings = 0usize;
        for relative in files {
            let bytes = fs::read(ctx.repo_path(&relative)).await.map_err(|e| {
                StepError::io(format!("Failed to read {}", relative.display()), e)
            })?;
            let source = String::from_utf8_lossy(&bytes);

            match scan_source(ctx.parser.as_ref(), &relative, &source, &rules) {
                Ok(hits) if hits.is_empty() => {}
                Ok(hits) => {
                    total_strings += hits.len();
                    ctx.string_hits_by_file.insert(relative, hits);
                }
                Err(e) => {
                    debug!(file = %relative.display(), error = %e, "Skipping unparseable file");
                }
            }
        }

        let files_with_strings = ctx.string_hits_by_file.len();
        ctx.logger
            .log(
                LogEntry::new(
                    "scan",
                    LogLevel::Info,
                    format!(
                        "Found {} hardcoded strings across {} files.",
                        total_strings, files_with_strings
                    ),
                )
                .with_data(json!({
                    "filesWithStrings": files_with_strings,
                    "totalStrings": total_strings,
                })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::framework::NextAppRouterAdapter;
    use crate::scanner::StringHitKind;
    use crate::test_support::TestRun;

    #[tokio::test]
    async fn test_scan_collects_hits_per_file() {
        let run = TestRun::new(&[]).await;
        run.write(
            "app/page.tsx",
            "export default function Page() {\n  return (\n    <main>\n      <h1>Hello World</h1>\n      <p>   </p>\n      <span>{t('common.greeting')}</span>\n    </main>\n  );\n}\n",
        );
        run.write(
            "components/Search.tsx",
            "export function Search() {\n  return <input placeholder=\"Search products\" type=\"text\" />;\n}\n",
        );
        run.write("components/broken.tsx", "export const = <div>Unclosed");
        run.write("lib/util.ts", "export const label = 'Not scanned';");
        let mut ctx = run.context();

        ScanStep.run(&mut ctx).await.unwrap();

        let page = &ctx.string_hits_by_file[&PathBuf::from("app/page.tsx")];
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].value, "Hello World");
        assert_eq!(page[0].kind, StringHitKind::JsxText);
        assert_eq!(page[0].line, 4);

        let search = &ctx.string_hits_by_file[&PathBuf::from("components/Search.tsx")];
        assert_eq!(search.len(), 1);
        assert_eq!(search[0].kind, StringHitKind::JsxAttribute);
        assert_eq!(search[0].attribute_name.as_deref(), Some("placeholder"));
        assert!(!ctx.string_hits_by_file.contains_key(&PathBuf::from("lib/util.ts")));

        let job = run.job().await;
        let summary = job.logs.last().unwrap();
        assert_eq!(summary.message, "Found 2 hardcoded strings across 2 files.");
        assert_eq!(summary.data.as_ref().unwrap()["filesWithStrings"], 2);
        assert_eq!(summary.data.as_ref().unwrap()["totalStrings"], 2);
    }

    #[tokio::test]
    async fn test_scan_with_no_source_dirs() {
        let run = TestRun::new(&[]).await;
        run.write("README.md", "# Readme");
        let mut ctx = run.context();

        ScanStep.run(&mut ctx).await.unwrap();

        assert!(ctx.string_hits_by_file.is_empty());
        assert_eq!(
            run.job().await.logs[0].message,
            "Found 0 hardcoded strings across 0 files."
        );
    }

    #[tokio::test]
    async fn test_scan_uses_adapter_dirs() {
        let run = TestRun::new(&[]).await;
        run.write("app/[locale]/about/page.jsx", "export default () => <p>About us</p>;");
        let mut ctx = run.context();
        ctx.framework_adapter = Some(std::sync::Arc::new(NextAppRouterAdapter));

        ScanStep.run(&mut ctx).await.unwrap();
        assert_eq!(
            ctx.string_hits_by_file.keys().collect::<Vec<_>>(),
            vec![&PathBuf::from("app/[locale]/about/page.jsx")]
        );
    }
}
