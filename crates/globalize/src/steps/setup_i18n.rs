use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::framework::scaffold::{self, DEFAULT_MIDDLEWARE_MATCHER};
use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, Step, StepError, StepName};

/// Writes i18n scaffolding through the selected adapter, or the generic
/// next-intl layout when no adapter was selected.
pub struct SetupI18nStep;

#[async_trait]
impl Step for SetupI18nStep {
    fn name(&self) -> StepName {
        StepName::SetupI18n
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        if let Some(adapter) = ctx.framework_adapter.clone() {
            debug!(adapter = adapter.key(), "Delegating i18n setup to adapter");
            return adapter.setup_i18n(ctx).await;
        }

        let source = ctx.settings.source_locale.clone();
        scaffold::write_shared_scaffold(
            &ctx.repo_dir,
            &source,
            &ctx.target_languages,
            DEFAULT_MIDDLEWARE_MATCHER,
        )
        .await?;
        scaffold::write_next_config(&ctx.repo_dir).await?;

        for (from, to) in scaffold::relocate_into_locale_segment(&ctx.repo_dir).await? {
            if let Some(hits) = ctx.string_hits_by_file.remove(&from) {
                ctx.string_hits_by_file.insert(to, hits);
            }
        }

        let locales_added: Vec<&str> = std::iter::once(source.as_str())
            .chain(ctx.target_languages.iter().map(String::as_str))
            .collect();
        ctx.logger
            .log(
                LogEntry::new(
                    "setup-i18n",
                    LogLevel::Info,
                    format!(
                        "i18n infrastructure scaffolded (i18n.json, messages/{}.json, next-intl config).",
                        source
                    ),
                )
                .with_data(json!({ "localesAdded": locales_added })),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::framework::NextAppRouterAdapter;
    use crate::scanner::{StringHit, StringHitKind};
    use crate::test_support::TestRun;

    fn hit(value: &str) -> StringHit {
        StringHit {
            value: value.to_string(),
            line: 1,
            column: 0,
            kind: StringHitKind::JsxText,
            attribute_name: None,
        }
    }

    #[tokio::test]
    async fn test_default_scaffold_relocates_and_rekeys() {
        let run = TestRun::new(&["es", "fr"]).await;
        run.write("app/layout.tsx", "export default function RootLayout() {}");
        run.write("app/page.tsx", "export default function Page() {}");
        run.write("app/about/page.tsx", "export default function About() {}");
        let mut ctx = run.context();
        ctx.string_hits_by_file
            .insert(PathBuf::from("app/page.tsx"), vec![hit("Welcome")]);
        ctx.string_hits_by_file
            .insert(PathBuf::from("app/about/page.tsx"), vec![hit("About us")]);

        SetupI18nStep.run(&mut ctx).await.unwrap();

        assert!(run.exists("app/[locale]/layout.tsx"));
        assert!(run.exists("app/[locale]/page.tsx"));
        assert!(!run.exists("app/page.tsx"));
        assert!(run.exists("app/about/page.tsx"));
        assert_eq!(
            ctx.string_hits_by_file.keys().cloned().collect::<Vec<_>>(),
            vec![
                PathBuf::from("app/[locale]/page.tsx"),
                PathBuf::from("app/about/page.tsx"),
            ]
        );

        assert_eq!(run.read("messages/en.json"), "{}\n");
        assert!(run.read("i18n.json").contains("\"targets\": [\n      \"es\",\n      \"fr\"\n    ]"));
        assert!(run.read("next.config.ts").contains("withNextIntl(config)"));
        assert!(run.read("middleware.ts").contains("'/((?!_next|.*\\\\..*).*)'"));

        let job = run.job().await;
        let entry = job.logs.last().unwrap();
        assert_eq!(
            entry.message,
            "i18n infrastructure scaffolded (i18n.json, messages/en.json, next-intl config)."
        );
        assert_eq!(
            entry.data.as_ref().unwrap()["localesAdded"],
            serde_json::json!(["en", "es", "fr"])
        );
    }

    #[tokio::test]
    async fn test_adapter_setup_is_used_when_selected() {
        let run = TestRun::new(&["de"]).await;
        run.write("app/page.tsx", "export default function Page() {}");
        let mut ctx = run.context();
        ctx.framework_adapter = Some(Arc::new(NextAppRouterAdapter));

        SetupI18nStep.run(&mut ctx).await.unwrap();

        assert!(run.exists("app/page.tsx"));
        assert!(!run.exists("next.config.ts"));
        assert_eq!(run.job().await.logs.last().unwrap().level, LogLevel::Success);
    }
}
