use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::debug;

use crate::git::CommitAuthor;
use crate::github::authenticated_remote_url;
use crate::job::{LogEntry, LogLevel};
use crate::pipeline::{PipelineContext, PushTarget, Step, StepError, StepName};
use crate::sanitize::{redact_credentials_in, redact_repo_url};

const STEP: &str = "commit-push";
const BOT_EMAIL: &str = "bot@example.com";

/// Commits the working tree and force-pushes it to the job branch, either on
/// the source repository (when the user owns it) or on a fork.
pub struct CommitPushStep;

#[async_trait]
impl Step for CommitPushStep {
    fn name(&self) -> StepName {
        StepName::CommitPush
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        let owner = ctx.job.repo_owner.clone();
        let repo = ctx.job.repo_name.clone();
        let branch = ctx.settings.branch_name.clone();
        let username = ctx.github_username.clone();
        let token = ctx
            .github_token
            .as_ref()
            .map(|t| t.expose_secret().to_string());

        if token.is_some() && username.is_none() {
            ctx.logger
                .error(STEP, "GitHub identity required for push. Sign in with GitHub.")
                .await?;
            return Err(StepError::Validation(
                "GitHub identity required for push.".to_string(),
            ));
        }

        let fork_owner = username
            .clone()
            .unwrap_or_else(|| ctx.settings.bot_username.clone());
        let is_own_repo = fork_owner == owner;

        let announce = if is_own_repo {
            format!(
                "Repository is owned by {}. Will push directly to new branch (no fork needed).",
                fork_owner
            )
        } else {
            format!(
                "Creating fork {}/{} → {}/{}...",
                owner, repo, fork_owner, repo
            )
        };
        ctx.logger.info(STEP, announce).await?;

        let target = if is_own_repo {
            configure_origin(ctx, &owner, &repo, token.as_deref()).await?;
            PushTarget {
                remote: "origin".to_string(),
                owner: fork_owner.clone(),
                repo: repo.clone(),
                branch: branch.clone(),
                is_own_repo,
            }
        } else {
            ensure_fork(ctx, &owner, &repo, &fork_owner).await?;
            ctx.git
                .set_remote(
                    &ctx.repo_dir,
                    "fork",
                    &authenticated_remote_url(&fork_owner, &repo, token.as_deref()),
                )
                .await?;
            PushTarget {
                remote: "fork".to_string(),
                owner: fork_owner.clone(),
                repo: repo.clone(),
                branch: branch.clone(),
                is_own_repo,
            }
        };

        commit_changes(ctx, username.as_deref(), &fork_owner).await?;
        push(ctx, &target, token.is_some()).await?;

        let target_repo = format!("{}/{}", target.owner, target.repo);
        ctx.logger
            .log(
                LogEntry::new(
                    STEP,
                    LogLevel::Success,
                    format!(
                        "Pushed changes to {} on branch {}.",
                        target_repo, target.branch
                    ),
                )
                .with_data(json!({ "branch": target.branch, "repo": target_repo })),
            )
            .await?;
        ctx.push_target = Some(target);
        Ok(())
    }
}

async fn configure_origin(
    ctx: &PipelineContext,
    owner: &str,
    repo: &str,
    token: Option<&str>,
) -> Result<(), StepError> {
    ctx.logger
        .info(
            STEP,
            format!(
                "Updating origin remote URL (token {})...",
                if token.is_some() { "present" } else { "missing" }
            ),
        )
        .await?;
    ctx.git
        .set_remote(
            &ctx.repo_dir,
            "origin",
            &authenticated_remote_url(owner, repo, token),
        )
        .await?;

    let configured = ctx.git.remote_url(&ctx.repo_dir, "origin").await?;
    ctx.logger
        .info(
            STEP,
            format!(
                "Origin remote configured: {}",
                configured
                    .as_deref()
                    .map(redact_repo_url)
                    .unwrap_or_else(|| "not found".to_string())
            ),
        )
        .await?;
    ctx.logger
        .info(
            STEP,
            format!(
                "Using origin remote for direct push (own repo: {}/{}).",
                owner, repo
            ),
        )
        .await?;
    Ok(())
}

/// Makes sure `{fork_owner}/{repo}` exists. Forking is asynchronous on the
/// host, so a fresh fork is polled until it becomes visible.
async fn ensure_fork(
    ctx: &PipelineContext,
    owner: &str,
    repo: &str,
    fork_owner: &str,
) -> Result<(), StepError> {
    if ctx.hosting.get_repo(fork_owner, repo).await.is_ok() {
        ctx.logger
            .info(STEP, format!("Fork {}/{} already exists.", fork_owner, repo))
            .await?;
        return Ok(());
    }

    ctx.logger.info(STEP, "Creating fork...").await?;
    match ctx.hosting.create_fork(owner, repo).await {
        Ok(_) => {
            ctx.logger
                .info(
                    STEP,
                    "Fork creation initiated. Waiting for fork to be ready...",
                )
                .await?;
            if wait_for_fork(ctx, fork_owner, repo).await {
                ctx.logger
                    .info(STEP, format!("Fork {}/{} is ready.", fork_owner, repo))
                    .await?;
            } else {
                ctx.logger
                    .warning(
                        STEP,
                        format!(
                            "Fork {}/{} is not visible yet. Attempting push anyway.",
                            fork_owner, repo
                        ),
                    )
                    .await?;
            }
            Ok(())
        }
        Err(e) if e.status() == Some(422) => {
            ctx.logger
                .info(
                    STEP,
                    "Fork may already exist or cannot be created. Continuing...",
                )
                .await?;
            Ok(())
        }
        Err(e) => {
            ctx.logger
                .error(STEP, format!("Failed to create fork: {}", e))
                .await?;
            Err(e.into())
        }
    }
}

async fn wait_for_fork(ctx: &PipelineContext, fork_owner: &str, repo: &str) -> bool {
    for attempt in 1..=ctx.settings.fork_poll_attempts {
        tokio::time::sleep(ctx.settings.fork_poll_interval).await;
        match ctx.hosting.get_repo(fork_owner, repo).await {
            Ok(_) => return true,
            Err(e) => debug!(attempt, error = %e, "Fork not ready"),
        }
    }
    false
}

async fn commit_changes(
    ctx: &PipelineContext,
    username: Option<&str>,
    fork_owner: &str,
) -> Result<(), StepError> {
    ctx.git.stage_all(&ctx.repo_dir).await?;

    let (identity_name, identity_email, author) = match username {
        Some(user) => {
            let email = format!("{}@users.noreply.github.com", user);
            let author = CommitAuthor {
                name: user.to_string(),
                email: email.clone(),
            };
            (user.to_string(), email, author)
        }
        None => (
            fork_owner.to_string(),
            BOT_EMAIL.to_string(),
            CommitAuthor {
                name: format!("{}[bot]", fork_owner),
                email: BOT_EMAIL.to_string(),
            },
        ),
    };
    ctx.git
        .set_identity(&ctx.repo_dir, &identity_name, &identity_email)
        .await?;
    ctx.git
        .commit(&ctx.repo_dir, &ctx.settings.commit_message, &author)
        .await?;
    Ok(())
}

async fn push(ctx: &PipelineContext, target: &PushTarget, has_token: bool) -> Result<(), StepError> {
    let remote_url = ctx
        .git
        .remote_url(&ctx.repo_dir, &target.remote)
        .await?
        .map(|url| redact_repo_url(&url))
        .unwrap_or_else(|| "not found".to_string());
    let target_repo = format!("{}/{}", target.owner, target.repo);

    ctx.logger
        .log(
            LogEntry::new(
                STEP,
                LogLevel::Info,
                format!("Pushing to {}:{}...", target.remote, target.branch),
            )
            .with_data(json!({
                "remote": target.remote,
                "remoteUrl": remote_url,
                "targetRepo": target_repo,
                "branch": target.branch,
                "hasToken": has_token,
            })),
        )
        .await?;

    let refspec = format!("HEAD:{}", target.branch);
    let Err(e) = ctx
        .git
        .push_force(&ctx.repo_dir, &target.remote, &refspec)
        .await
    else {
        return Ok(());
    };

    let message = redact_credentials_in(&e.to_string());
    ctx.logger
        .log(
            LogEntry::new(STEP, LogLevel::Error, format!("Push failed: {}", message)).with_data(
                json!({
                    "error": message,
                    "remote": target.remote,
                    "remoteUrl": remote_url,
                    "targetRepo": target_repo,
                    "branch": target.branch,
                    "hasToken": has_token,
                    "isOwnRepo": target.is_own_repo,
                }),
            ),
        )
        .await?;
    ctx.logger
        .error(
            STEP,
            format!(
                "Diagnostics: remote={}, repo={}, token={}, ownRepo={}",
                target.remote,
                target_repo,
                if has_token { "present" } else { "missing" },
                target.is_own_repo
            ),
        )
        .await?;
    Err(StepError::Command(format!("Failed to push: {}", message)))
}
