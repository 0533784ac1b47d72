use std::path::Path;

use async_trait::async_trait;
use serde_json::json;

use super::scaffold::{self, ADAPTER_MIDDLEWARE_MATCHER};
use super::{FrameworkAdapter, FrameworkError};
use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, StepError};

/// Next.js projects using the App Router (`app/` directory) with next-intl.
#[derive(Debug, Clone, Copy, Default)]
pub struct NextAppRouterAdapter;

#[async_trait]
impl FrameworkAdapter for NextAppRouterAdapter {
    fn key(&self) -> &'static str {
        "nextjs-app-router"
    }

    fn name(&self) -> &'static str {
        "Next.js App Router"
    }

    async fn validate(&self, repo_dir: &Path) -> Result<(), FrameworkError> {
        scaffold::validate_next_app_router(repo_dir).await
    }

    async fn setup_i18n(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let source = ctx.settings.source_locale.clone();
        scaffold::write_shared_scaffold(
            &ctx.repo_dir,
            &source,
            &ctx.target_languages,
            ADAPTER_MIDDLEWARE_MATCHER,
        )
        .await?;
        scaffold::wrap_root_layout(&ctx.repo_dir).await?;

        let locales_added: Vec<&str> = std::iter::once(source.as_str())
            .chain(ctx.target_languages.iter().map(String::as_str))
            .collect();
        ctx.logger
            .log(
                LogEntry::new(
                    "setup-i18n",
                    LogLevel::Success,
                    format!(
                        "Set up i18n infrastructure for {} with {} target languages",
                        self.name(),
                        ctx.target_languages.len()
                    ),
                )
                .with_data(json!({ "localesAdded": locales_added })),
            )
            .await?;
        Ok(())
    }

    fn source_dirs(&self) -> Vec<String> {
        vec!["app".to_string(), "components".to_string()]
    }

    fn file_patterns(&self) -> Vec<String> {
        ["tsx", "ts", "jsx", "js"]
            .iter()
            .map(|ext| format!("**/*.{}", ext))
            .collect()
    }

    fn transform_rules(&self) -> Vec<String> {
        scaffold::default_transform_rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRun;

    #[tokio::test]
    async fn test_setup_writes_scaffold_and_wraps_layout() {
        let run = TestRun::new(&["es", "fr"]).await;
        run.write("app/layout.tsx", "export default function RootLayout({ children }) {\n  return <html><body>{children}</body></html>;\n}\n");
        let mut ctx = run.context();

        NextAppRouterAdapter.setup_i18n(&mut ctx).await.unwrap();

        let layout = run.read("app/layout.tsx");
        assert!(layout.contains("<NextIntlClientProvider messages={await getMessages()}>"));
        // The adapter keeps the layout in place.
        assert!(!run.exists("app/[locale]/layout.tsx"));
        assert!(run.read("middleware.ts").contains("_vercel"));
        assert!(run.read("lib/i18n.ts").contains("['en', 'es', 'fr']"));

        let job = run.job().await;
        let last = job.logs.last().unwrap();
        assert_eq!(
            last.message,
            "Set up i18n infrastructure for Next.js App Router with 2 target languages"
        );
        assert_eq!(
            last.data.as_ref().unwrap()["localesAdded"],
            serde_json::json!(["en", "es", "fr"])
        );
    }

    #[tokio::test]
    async fn test_validate_delegates_to_structural_check() {
        let run = TestRun::new(&[]).await;
        run.write("app/page.tsx", "export default function Page() { return null; }");
        run.write("package.json", r#"{"dependencies": {"next": "15.1.0"}}"#);
        NextAppRouterAdapter.validate(&run.repo_dir()).await.unwrap();
    }

    #[test]
    fn test_scan_configuration() {
        let adapter = NextAppRouterAdapter;
        assert_eq!(adapter.source_dirs(), vec!["app", "components"]);
        assert_eq!(
            adapter.file_patterns(),
            vec!["**/*.tsx", "**/*.ts", "**/*.jsx", "**/*.js"]
        );
        assert!(!adapter.transform_rules().is_empty());
    }
}
