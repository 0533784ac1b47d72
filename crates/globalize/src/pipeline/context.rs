use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use super::collaborators::Collaborators;
use super::config::PipelineConfig;
use super::logger::JobLogger;
use crate::framework::{DetectedFramework, FrameworkAdapter, FrameworkRegistry};
use crate::git::GitClient;
use crate::github::HostingApi;
use crate::job::{Job, JobStats};
use crate::llm::CodeRewriter;
use crate::scanner::{SourceParser, StringHit};
use crate::translator::TranslationCli;

/// Short-lived credentials supplied by whoever triggered the run.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub token: Option<SecretString>,
    pub username: Option<String>,
}

impl Credentials {
    pub fn new(token: Option<SecretString>, username: Option<String>) -> Self {
        Self { token, username }
    }
}

/// Where commit-push sent the branch; open-pr opens the pull request from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushTarget {
    /// Local remote name: `origin` or `fork`.
    pub remote: String,
    pub owner: String,
    pub repo: String,
    pub branch: String,
    pub is_own_repo: bool,
}

/// Source-locale messages, ordered by key. The first value written for a key
/// is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageCatalog(BTreeMap<String, String>);

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inserts unless the key already has a value. Returns true if inserted.
    pub fn insert_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        match self.0.entry(key.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Merges `messages`, keeping existing values. Returns how many were added.
    pub fn merge<I, K, V>(&mut self, messages: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut added = 0;
        for (key, value) in messages {
            if self.insert_if_absent(key, value) {
                added += 1;
            }
        }
        added
    }

    /// Two-space indented JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(&self.0)?;
        json.push('\n');
        Ok(json)
    }
}

impl IntoIterator for MessageCatalog {
    type Item = (String, String);
    type IntoIter = std::collections::btree_map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Mutable state threaded through the steps of one run.
pub struct PipelineContext {
    pub job: Job,
    pub job_id: String,
    pub work_dir: PathBuf,
    pub repo_dir: PathBuf,

    /// Token used for git operations; only an explicitly supplied one.
    pub github_token: Option<SecretString>,
    pub github_username: Option<String>,
    /// Whether the hosting client carries a token (explicit or configured).
    pub has_api_token: bool,

    pub logger: JobLogger,
    pub hosting: Arc<dyn HostingApi>,
    pub git: Arc<dyn GitClient>,
    pub rewriter: Option<Arc<dyn CodeRewriter>>,
    pub translator: Arc<dyn TranslationCli>,
    pub translator_key: Option<SecretString>,
    pub parser: Arc<dyn SourceParser>,
    pub frameworks: Arc<FrameworkRegistry>,
    pub settings: Arc<PipelineConfig>,

    pub stats: JobStats,
    /// Hits per repository-relative file path.
    pub string_hits_by_file: BTreeMap<PathBuf, Vec<StringHit>>,
    pub source_messages: MessageCatalog,
    pub target_languages: Vec<String>,
    pub detected_framework: Option<DetectedFramework>,
    pub framework_adapter: Option<Arc<dyn FrameworkAdapter>>,
    pub push_target: Option<PushTarget>,
}

impl PipelineContext {
    pub fn new(
        job: Job,
        credentials: &Credentials,
        hosting: Arc<dyn HostingApi>,
        collaborators: &Collaborators,
        settings: Arc<PipelineConfig>,
        logger: JobLogger,
    ) -> Self {
        let job_id = job.id.clone();
        let work_dir = settings.work_root.join(&job_id);
        let repo_dir = work_dir.join("repo");
        let requested = if job.languages.is_empty() {
            &settings.default_languages
        } else {
            &job.languages
        };
        let target_languages = resolve_targets(requested, &settings.source_locale);
        let github_username = credentials
            .username
            .clone()
            .or_else(|| job.github_username.clone());

        Self {
            job_id,
            work_dir,
            repo_dir,
            github_token: credentials.token.clone(),
            github_username,
            has_api_token: credentials.token.is_some() || collaborators.fallback_token.is_some(),
            logger,
            hosting,
            git: collaborators.git.clone(),
            rewriter: collaborators.rewriter.clone(),
            translator: collaborators.translator.clone(),
            translator_key: collaborators.translator_key.clone(),
            parser: collaborators.parser.clone(),
            frameworks: collaborators.frameworks.clone(),
            settings,
            stats: JobStats::default(),
            string_hits_by_file: BTreeMap::new(),
            source_messages: MessageCatalog::new(),
            target_languages,
            detected_framework: None,
            framework_adapter: None,
            push_target: None,
            job,
        }
    }

    /// Absolute path of a repository-relative path.
    pub fn repo_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.repo_dir.join(relative)
    }

    /// Path of the source-locale catalog inside the repository.
    pub fn source_catalog_path(&self) -> PathBuf {
        self.repo_dir
            .join("messages")
            .join(format!("{}.json", self.settings.source_locale))
    }
}

/// Requested languages in order, without duplicates or the source locale.
fn resolve_targets(requested: &[String], source_locale: &str) -> Vec<String> {
    let mut targets: Vec<String> = Vec::with_capacity(requested.len());
    for language in requested {
        if language != source_locale && !targets.contains(language) {
            targets.push(language.clone());
        }
    }
    targets
}
