//! Isolated pipeline runs over an in-memory SQLite job store and a
//! temporary work root.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use tempfile::TempDir;

use globalize::db::Database;
use globalize::framework::FrameworkRegistry;
use globalize::job::{Job, NewJob};
use globalize::llm::CodeRewriter;
use globalize::pipeline::{Collaborators, Pipeline, PipelineConfig, StepRegistry};
use globalize::scanner::TolerantParser;
use globalize::store::{lifecycle, JobStore, SqliteJobStore, StoreCancellation};
use globalize::test_support::{FakeConnector, FakeGit, FakeHosting, FakeRewriter, FakeTranslator};

use super::fixtures::{next_app_hosting, page_rewriter};

pub struct PipelineHarness {
    temp_dir: TempDir,
    pub store: Arc<SqliteJobStore>,
    pub git: Arc<FakeGit>,
    pub hosting: Arc<FakeHosting>,
    pub rewriter: Arc<FakeRewriter>,
    pub translator: Arc<FakeTranslator>,
}

impl PipelineHarness {
    pub fn new(git: FakeGit) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open database");
        Self {
            temp_dir,
            store: Arc::new(SqliteJobStore::new(db)),
            git: Arc::new(git),
            hosting: Arc::new(next_app_hosting()),
            rewriter: Arc::new(page_rewriter()),
            translator: Arc::new(FakeTranslator::new()),
        }
    }

    pub fn with_translator(mut self, translator: FakeTranslator) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    pub fn settings(&self) -> PipelineConfig {
        PipelineConfig {
            work_root: self.temp_dir.path().join("work"),
            fork_poll_attempts: 3,
            fork_poll_interval: Duration::ZERO,
            ..PipelineConfig::default()
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            connector: Arc::new(FakeConnector(self.hosting.clone())),
            git: self.git.clone(),
            rewriter: Some(self.rewriter.clone() as Arc<dyn CodeRewriter>),
            translator: self.translator.clone(),
            translator_key: Some(SecretString::from("lingo-integration-key")),
            fallback_token: None,
            parser: Arc::new(TolerantParser),
            frameworks: Arc::new(FrameworkRegistry::standard()),
        }
    }

    pub fn pipeline(&self, steps: StepRegistry) -> Pipeline {
        let store: Arc<dyn JobStore> = self.store.clone();
        Pipeline::new(
            store.clone(),
            Arc::new(StoreCancellation::new(store)),
            self.collaborators(),
            steps,
            Arc::new(self.settings()),
        )
    }

    pub async fn create_job(&self, languages: &[&str]) -> Job {
        lifecycle::create_job(
            self.store.as_ref(),
            NewJob::new("https://github.com/acme/web").with_languages(languages.iter().copied()),
        )
        .await
        .expect("Failed to create job")
    }

    pub async fn stored(&self, job_id: &str) -> Job {
        self.store
            .get_by_id(job_id)
            .await
            .expect("Failed to load job")
            .expect("Job missing")
    }

    pub fn repo_dir(&self, job: &Job) -> PathBuf {
        self.settings().work_root.join(&job.id).join("repo")
    }
}
