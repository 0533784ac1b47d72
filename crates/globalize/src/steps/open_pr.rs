use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::json;

use crate::github::{HostingError, NewPullRequest, PullRequest};
use crate::job::{JobStats, LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, PushTarget, Step, StepError, StepName};

const STEP: &str = "open-pr";

/// Opens a pull request from the pushed branch against the source
/// repository's default branch, reusing an already open one.
pub struct OpenPrStep;

#[async_trait]
impl Step for OpenPrStep {
    fn name(&self) -> StepName {
        StepName::OpenPr
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let Some(target) = ctx.push_target.clone() else {
            return Err(StepError::Validation(
                "No pushed branch to open a pull request from.".to_string(),
            ));
        };
        let owner = ctx.job.repo_owner.clone();
        let repo = ctx.job.repo_name.clone();

        let base = ctx.hosting.get_repo(&owner, &repo).await?.default_branch;
        let request = NewPullRequest {
            title: ctx.settings.commit_message.clone(),
            head: pull_request_head(&target),
            base,
            body: pull_request_body(&ctx.target_languages, &ctx.stats),
        };

        let pr = match ctx
            .hosting
            .create_pull_request(&owner, &repo, &request)
            .await
        {
            Ok(pr) => pr,
            Err(e) if e.status() == Some(422) => existing_pull_request(ctx, &target, e).await?,
            Err(e) => return Err(e.into()),
        };

        ctx.logger.set_pr_url(&pr.html_url).await?;
        ctx.job.pr_url = Some(pr.html_url.clone());
        ctx.logger
            .log(
                LogEntry::new(
                    STEP,
                    LogLevel::Success,
                    format!("Opened pull request #{}: {}", pr.number, pr.html_url),
                )
                .with_data(json!({ "prUrl": pr.html_url, "number": pr.number })),
            )
            .await?;
        Ok(())
    }
}

/// The host answers 422 when a pull request for the head already exists.
async fn existing_pull_request(
    ctx: &PipelineContext,
    target: &PushTarget,
    create_error: HostingError,
) -> Result<PullRequest, StepError> {
    let head = format!("{}:{}", target.owner, target.branch);
    match ctx
        .hosting
        .find_open_pull_request(&ctx.job.repo_owner, &ctx.job.repo_name, &head)
        .await?
    {
        Some(pr) => {
            ctx.logger
                .info(
                    STEP,
                    format!("Pull request #{} already open for {}; reusing it.", pr.number, head),
                )
                .await?;
            Ok(pr)
        }
        None => Err(create_error.into()),
    }
}

fn pull_request_head(target: &PushTarget) -> String {
    if target.is_own_repo {
        target.branch.clone()
    } else {
        format!("{}:{}", target.owner, target.branch)
    }
}

fn pull_request_body(languages: &[String], stats: &JobStats) -> String {
    let mut body = String::from(
        "This pull request adds internationalization with next-intl and Lingo.dev.\n\n",
    );
    if languages.is_empty() {
        body.push_str("Target languages: none\n");
    } else {
        let _ = writeln!(body, "Target languages: {}", languages.join(", "));
    }
    let _ = writeln!(body, "\n- Files modified: {}", stats.files_modified);
    let _ = writeln!(body, "- Strings found: {}", stats.strings_found);
    let _ = writeln!(body, "- Languages added: {}", stats.languages_added);
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeHosting, TestRun};

    fn fork_target() -> PushTarget {
        PushTarget {
            remote: "fork".into(),
            owner: "octo".into(),
            repo: "web".into(),
            branch: "feat/i18n-lingo-dev".into(),
            is_own_repo: false,
        }
    }

    #[tokio::test]
    async fn test_requires_push_target() {
        let run = TestRun::new(&[]).await;
        let mut ctx = run.context();
        let err = OpenPrStep.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Validation(_)));
    }

    #[tokio::test]
    async fn test_opens_pr_from_fork() {
        let hosting = FakeHosting::new().with_repo("acme", "web", "develop");
        let run = TestRun::new(&["de", "fr"]).await.with_hosting(hosting);
        let mut ctx = run.context();
        ctx.push_target = Some(fork_target());
        ctx.stats.files_modified = 4;

        OpenPrStep.run(&mut ctx).await.unwrap();

        let created = run.hosting.created_pull_requests();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].head, "octo:feat/i18n-lingo-dev");
        assert_eq!(created[0].base, "develop");
        assert!(created[0].body.contains("Target languages: de, fr"));
        assert!(created[0].body.contains("- Files modified: 4"));

        let job = run.job().await;
        assert_eq!(job.pr_url.as_deref(), Some("https://github.com/acme/web/pull/1"));
        assert_eq!(ctx.job.pr_url, job.pr_url);
        let last = job.logs.last().unwrap();
        assert_eq!(last.level, LogLevel::Success);
        assert_eq!(
            last.data.as_ref().unwrap()["prUrl"],
            "https://github.com/acme/web/pull/1"
        );
    }

    #[tokio::test]
    async fn test_own_repo_uses_bare_branch_head() {
        let hosting = FakeHosting::new().with_repo("acme", "web", "main");
        let run = TestRun::new(&[]).await.with_hosting(hosting);
        let mut ctx = run.context();
        ctx.push_target = Some(PushTarget {
            remote: "origin".into(),
            owner: "acme".into(),
            is_own_repo: true,
            ..fork_target()
        });

        OpenPrStep.run(&mut ctx).await.unwrap();
        assert_eq!(run.hosting.created_pull_requests()[0].head, "feat/i18n-lingo-dev");
    }

    #[tokio::test]
    async fn test_existing_pr_is_reused() {
        let hosting = FakeHosting::new()
            .with_repo("acme", "web", "main")
            .with_open_pull_request(
                "octo:feat/i18n-lingo-dev",
                PullRequest {
                    number: 7,
                    html_url: "https://github.com/acme/web/pull/7".into(),
                },
            );
        let run = TestRun::new(&[]).await.with_hosting(hosting);
        let mut ctx = run.context();
        ctx.push_target = Some(fork_target());

        OpenPrStep.run(&mut ctx).await.unwrap();

        let job = run.job().await;
        assert_eq!(job.pr_url.as_deref(), Some("https://github.com/acme/web/pull/7"));
        assert!(job.logs.iter().any(|e| e.message.contains("reusing it")));
    }

    #[tokio::test]
    async fn test_missing_base_repo_fails() {
        let run = TestRun::new(&[]).await;
        let mut ctx = run.context();
        ctx.push_target = Some(fork_target());

        let err = OpenPrStep.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, StepError::Hosting(HostingError::NotFound(_))));
        assert!(run.job().await.pr_url.is_none());
    }

    #[test]
    fn test_body_lists_languages_and_stats() {
        let stats = JobStats {
            files_modified: 2,
            strings_found: 9,
            languages_added: 3,
        };
        let body = pull_request_body(&["es".into(), "ja".into(), "pt-BR".into()], &stats);
        assert!(body.contains("Target languages: es, ja, pt-BR"));
        assert!(body.contains("- Strings found: 9"));
        assert!(body.contains("- Languages added: 3"));
    }
}
