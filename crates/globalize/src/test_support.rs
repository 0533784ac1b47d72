//! In-memory collaborators and a per-test run harness for step and runner
//! tests.
//!
//! Compiled for unit tests and, through the `test-support` feature, for the
//! integration tests under `tests/`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use tempfile::TempDir;

use crate::framework::FrameworkRegistry;
use crate::git::{CommitAuthor, GitClient, GitError};
use crate::github::{
    DirEntry, EntryKind, HostingApi, HostingConnector, HostingError, NewPullRequest, PullRequest,
    RepoInfo, RepoOwner,
};
use crate::job::{Job, JobStatus, NewJob};
use crate::llm::{CodeRewriter, RewriteError};
use crate::pipeline::{
    Collaborators, Credentials, JobLogger, PipelineConfig, PipelineContext, Step, StepError,
    StepName,
};
use crate::scanner::TolerantParser;
use crate::store::lifecycle::CANCELLED_BY_USER;
use crate::store::{JobPatch, JobStore, MemoryJobStore};
use crate::translator::{CommandOutput, TranslationCli, TranslatorError};

pub const TEST_REPO_URL: &str = "https://github.com/acme/web";

// ── Git ──

#[derive(Default)]
pub struct FakeGit {
    calls: Mutex<Vec<String>>,
    clone_files: Mutex<Vec<(String, String)>>,
    remotes: Mutex<HashMap<String, String>>,
    missing: AtomicBool,
    push_error: Mutex<Option<String>>,
    clone_error: Mutex<Option<String>>,
}

impl FakeGit {
    /// Clones by writing `files` into the destination.
    pub fn with_clone_files(self, files: Vec<(String, String)>) -> Self {
        *self.clone_files.lock().unwrap() = files;
        self
    }

    pub fn with_clone_error(self, message: &str) -> Self {
        *self.clone_error.lock().unwrap() = Some(message.to_string());
        self
    }

    /// Mutating operations in call order, e.g. `push origin HEAD:main`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn ensure_available(&self) -> Result<(), GitError> {
        if self.missing.load(Ordering::SeqCst) {
            return Err(GitError::NotInstalled);
        }
        Ok(())
    }

    async fn clone_repo(&self, url: &str, dest: &Path, depth: Option<u32>) -> Result<(), GitError> {
        let depth = depth.map_or_else(|| "full".to_string(), |d| d.to_string());
        self.record(format!("clone {} {} depth={}", url, dest.display(), depth));
        if let Some(message) = self.clone_error.lock().unwrap().clone() {
            return Err(GitError::Command {
                command: "clone".into(),
                message,
            });
        }

        std::fs::create_dir_all(dest).map_err(|source| GitError::Spawn {
            command: "clone".into(),
            source,
        })?;
        for (path, content) in self.clone_files.lock().unwrap().iter() {
            let target = dest.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(target, content).unwrap();
        }
        self.remotes
            .lock()
            .unwrap()
            .insert("origin".into(), url.to_string());
        Ok(())
    }

    async fn remove_remote(&self, _repo: &Path, name: &str) -> Result<bool, GitError> {
        Ok(self.remotes.lock().unwrap().remove(name).is_some())
    }

    async fn set_remote(&self, _repo: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.record(format!("set_remote {} {}", name, url));
        self.remotes
            .lock()
            .unwrap()
            .insert(name.to_string(), url.to_string());
        Ok(())
    }

    async fn remote_url(&self, _repo: &Path, name: &str) -> Result<Option<String>, GitError> {
        Ok(self.remotes.lock().unwrap().get(name).cloned())
    }

    async fn stage_all(&self, _repo: &Path) -> Result<(), GitError> {
        self.record("stage_all".into());
        Ok(())
    }

    async fn set_identity(&self, _repo: &Path, name: &str, email: &str) -> Result<(), GitError> {
        self.record(format!("set_identity {} {}", name, email));
        Ok(())
    }

    async fn commit(
        &self,
        _repo: &Path,
        message: &str,
        author: &CommitAuthor,
    ) -> Result<(), GitError> {
        self.record(format!("commit {} author={}", message, author.to_git_author()));
        Ok(())
    }

    async fn push_force(&self, _repo: &Path, remote: &str, refspec: &str) -> Result<(), GitError> {
        self.record(format!("push {} {}", remote, refspec));
        match self.push_error.lock().unwrap().clone() {
            Some(message) => Err(GitError::Command {
                command: "push".into(),
                message,
            }),
            None => Ok(()),
        }
    }
}

// ── Hosting ──

#[derive(Default)]
pub struct FakeHosting {
    calls: Mutex<Vec<String>>,
    repos: Mutex<HashMap<String, String>>,
    files: HashMap<String, String>,
    root_dirs: HashMap<String, Vec<String>>,
    /// Lookups left before a requested fork becomes visible.
    pending_forks: Mutex<HashMap<String, u32>>,
    fork_ready_after: Option<u32>,
    fork_error: Mutex<Option<HostingError>>,
    open_pull_requests: HashMap<String, PullRequest>,
    created: Mutex<Vec<NewPullRequest>>,
}

impl FakeHosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_repo(self, owner: &str, repo: &str, default_branch: &str) -> Self {
        self.repos
            .lock()
            .unwrap()
            .insert(format!("{}/{}", owner, repo), default_branch.to_string());
        self
    }

    pub fn with_file(mut self, owner: &str, repo: &str, path: &str, content: &str) -> Self {
        self.files
            .insert(format!("{}/{}/{}", owner, repo, path), content.to_string());
        self
    }

    pub fn with_root_dirs(mut self, owner: &str, repo: &str, dirs: &[&str]) -> Self {
        self.root_dirs.insert(
            format!("{}/{}", owner, repo),
            dirs.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    /// A created fork answers `get_repo` from the `lookups`-th call on.
    pub fn with_fork_ready_after(mut self, lookups: u32) -> Self {
        self.fork_ready_after = Some(lookups);
        self
    }

    pub fn with_fork_error(self, error: HostingError) -> Self {
        *self.fork_error.lock().unwrap() = Some(error);
        self
    }

    pub fn with_open_pull_request(mut self, head: &str, pr: PullRequest) -> Self {
        self.open_pull_requests.insert(head.to_string(), pr);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn created_pull_requests(&self) -> Vec<NewPullRequest> {
        self.created.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    /// Login forks are created under.
    fn current_login(&self) -> String {
        "octo".to_string()
    }

    fn repo_info(owner: &str, repo: &str, default_branch: &str) -> RepoInfo {
        RepoInfo {
            full_name: format!("{}/{}", owner, repo),
            default_branch: default_branch.to_string(),
            owner: RepoOwner {
                login: owner.to_string(),
            },
            fork: false,
        }
    }
}

#[async_trait]
impl HostingApi for FakeHosting {
    async fn get_repo(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError> {
        let key = format!("{}/{}", owner, repo);
        self.record(format!("get_repo {}", key));

        if let Some(branch) = self.repos.lock().unwrap().get(&key) {
            return Ok(Self::repo_info(owner, repo, branch));
        }

        let mut pending = self.pending_forks.lock().unwrap();
        if let Some(left) = pending.get_mut(&key) {
            *left = left.saturating_sub(1);
            if *left == 0 {
                pending.remove(&key);
                self.repos.lock().unwrap().insert(key, "main".into());
                return Ok(Self::repo_info(owner, repo, "main"));
            }
        }
        Err(HostingError::NotFound(format!("repos/{}", key)))
    }

    async fn create_fork(&self, owner: &str, repo: &str) -> Result<RepoInfo, HostingError> {
        self.record(format!("create_fork {}/{}", owner, repo));
        if let Some(error) = self.fork_error.lock().unwrap().take() {
            return Err(error);
        }
        let fork_owner = self.current_login();
        self.pending_forks.lock().unwrap().insert(
            format!("{}/{}", fork_owner, repo),
            self.fork_ready_after.unwrap_or(1),
        );
        Ok(Self::repo_info(&fork_owner, repo, "main"))
    }

    async fn current_user(&self) -> Result<String, HostingError> {
        self.record("current_user".into());
        Ok(self.current_login())
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        request: &NewPullRequest,
    ) -> Result<PullRequest, HostingError> {
        self.record(format!(
            "create_pull_request {}/{} head={} base={}",
            owner, repo, request.head, request.base
        ));
        let already_open = self
            .open_pull_requests
            .keys()
            .any(|head| head == &request.head || head.ends_with(&format!(":{}", request.head)));
        if already_open {
            return Err(HostingError::Api {
                status: 422,
                message: "A pull request already exists".into(),
            });
        }

        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        let number = created.len() as u64;
        Ok(PullRequest {
            number,
            html_url: format!("https://github.com/{}/{}/pull/{}", owner, repo, number),
        })
    }

    async fn find_open_pull_request(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
    ) -> Result<Option<PullRequest>, HostingError> {
        self.record(format!("find_open_pull_request {}/{} head={}", owner, repo, head));
        Ok(self.open_pull_requests.get(head).cloned())
    }

    async fn get_file_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<String, HostingError> {
        let key = format!("{}/{}/{}", owner, repo, path);
        self.record(format!("get_file_content {}", key));
        self.files
            .get(&key)
            .cloned()
            .ok_or(HostingError::NotFound(key))
    }

    async fn list_directory(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<Vec<DirEntry>, HostingError> {
        let key = format!("{}/{}", owner, repo);
        self.record(format!("list_directory {}/{}", key, path));
        let dirs = self
            .root_dirs
            .get(&key)
            .ok_or_else(|| HostingError::NotFound(key.clone()))?;
        Ok(dirs
            .iter()
            .map(|name| DirEntry {
                name: name.clone(),
                kind: EntryKind::Dir,
            })
            .collect())
    }
}

/// Hands out the same fake client whatever the token.
pub struct FakeConnector(pub Arc<FakeHosting>);

impl HostingConnector for FakeConnector {
    fn connect(&self, _token: Option<&SecretString>) -> Result<Arc<dyn HostingApi>, HostingError> {
        Ok(self.0.clone())
    }
}

// ── Rewriter ──

/// Answers with a canned response for the file named in the prompt.
#[derive(Default)]
pub struct FakeRewriter {
    responses: Mutex<HashMap<String, String>>,
    failing: bool,
    prompts: Mutex<Vec<String>>,
}

impl FakeRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn respond_for(self, relative_path: &str, response: &str) -> Self {
        self.set_response(relative_path, response);
        self
    }

    pub fn set_response(&self, relative_path: &str, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(relative_path.to_string(), response.to_string());
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeRewriter for FakeRewriter {
    async fn generate_content(&self, prompt: &str) -> Result<String, RewriteError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.failing {
            return Err(RewriteError::Api {
                status: 500,
                message: "internal error".into(),
            });
        }
        self.responses
            .lock()
            .unwrap()
            .iter()
            .find(|(path, _)| prompt.contains(&format!("File path: {}\n", path)))
            .map(|(_, response)| response.clone())
            .ok_or(RewriteError::EmptyResponse)
    }
}

// ── Translator ──

pub struct FakeTranslator {
    output: CommandOutput,
    runs: Mutex<Vec<PathBuf>>,
}

impl FakeTranslator {
    pub fn new() -> Self {
        Self::exiting(Some(0), "✔ Translated\n", "")
    }

    pub fn exiting(code: Option<i32>, stdout: &str, stderr: &str) -> Self {
        Self {
            output: CommandOutput {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
            runs: Mutex::new(Vec::new()),
        }
    }

    /// Repository directories the CLI was run in.
    pub fn runs(&self) -> Vec<PathBuf> {
        self.runs.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranslationCli for FakeTranslator {
    async fn run(
        &self,
        repo_dir: &Path,
        _api_key: &SecretString,
    ) -> Result<CommandOutput, TranslatorError> {
        self.runs.lock().unwrap().push(repo_dir.to_path_buf());
        Ok(self.output.clone())
    }
}

// ── Collaborators ──

/// Fake collaborators with every optional service configured.
pub fn collaborators() -> Collaborators {
    build_collaborators(
        Arc::new(FakeHosting::new()),
        Arc::new(FakeGit::default()),
        Some(Arc::new(FakeRewriter::new())),
        Arc::new(FakeTranslator::new()),
        Some(SecretString::from("lingo-test-key")),
    )
}

fn build_collaborators(
    hosting: Arc<FakeHosting>,
    git: Arc<FakeGit>,
    rewriter: Option<Arc<FakeRewriter>>,
    translator: Arc<FakeTranslator>,
    translator_key: Option<SecretString>,
) -> Collaborators {
    Collaborators {
        connector: Arc::new(FakeConnector(hosting)),
        git,
        rewriter: rewriter.map(|r| r as Arc<dyn CodeRewriter>),
        translator,
        translator_key,
        fallback_token: None,
        parser: Arc::new(TolerantParser),
        frameworks: Arc::new(FrameworkRegistry::standard()),
    }
}

// ── Scripted steps ──

enum Script {
    Succeed,
    Fail(String),
    CancelJob(Arc<MemoryJobStore>),
}

/// Step stand-in for runner tests.
pub struct ScriptedStep {
    name: StepName,
    script: Script,
}

impl ScriptedStep {
    pub fn ok(name: StepName) -> Self {
        Self {
            name,
            script: Script::Succeed,
        }
    }

    pub fn fail(name: StepName, message: &str) -> Self {
        Self {
            name,
            script: Script::Fail(message.to_string()),
        }
    }

    /// Succeeds after marking the job cancelled in `store`.
    pub fn cancel_job(name: StepName, store: Arc<MemoryJobStore>) -> Self {
        Self {
            name,
            script: Script::CancelJob(store),
        }
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn name(&self) -> StepName {
        self.name
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), StepError> {
        match &self.script {
            Script::Succeed => Ok(()),
            Script::Fail(message) => Err(StepError::Command(message.clone())),
            Script::CancelJob(store) => {
                store
                    .transition(
                        &ctx.job_id,
                        &[JobStatus::Running],
                        JobPatch::new()
                            .status(JobStatus::Cancelled)
                            .error(Some(CANCELLED_BY_USER)),
                    )
                    .await?;
                Ok(())
            }
        }
    }
}

// ── Run harness ──

/// A pending job for `acme/web` in a memory store, a temporary work root and
/// fake collaborators that tests can inspect afterwards.
pub struct TestRun {
    pub store: Arc<MemoryJobStore>,
    pub git: Arc<FakeGit>,
    pub hosting: Arc<FakeHosting>,
    pub rewriter: Arc<FakeRewriter>,
    pub translator: Arc<FakeTranslator>,
    seed: Job,
    settings: Arc<PipelineConfig>,
    credentials: Credentials,
    rewriter_enabled: bool,
    translator_key: Option<SecretString>,
    _work_root: TempDir,
}

impl TestRun {
    pub async fn new(languages: &[&str]) -> Self {
        let work_root = TempDir::new().unwrap();
        let settings = PipelineConfig {
            work_root: work_root.path().to_path_buf(),
            fork_poll_attempts: 3,
            fork_poll_interval: Duration::ZERO,
            ..PipelineConfig::default()
        };

        let store = Arc::new(MemoryJobStore::new());
        let job = Job::create(NewJob::new(TEST_REPO_URL).with_languages(languages.iter().copied()))
            .unwrap();
        store.insert(&job).await.unwrap();

        Self {
            store,
            git: Arc::new(FakeGit::default()),
            hosting: Arc::new(FakeHosting::new()),
            rewriter: Arc::new(FakeRewriter::new()),
            translator: Arc::new(FakeTranslator::new()),
            seed: job,
            settings: Arc::new(settings),
            credentials: Credentials::default(),
            rewriter_enabled: true,
            translator_key: Some(SecretString::from("lingo-test-key")),
            _work_root: work_root,
        }
    }

    pub fn with_token(mut self, token: &str, username: Option<&str>) -> Self {
        self.credentials = Credentials::new(
            Some(SecretString::from(token.to_string())),
            username.map(str::to_string),
        );
        self
    }

    pub fn with_hosting(mut self, hosting: FakeHosting) -> Self {
        self.hosting = Arc::new(hosting);
        self
    }

    pub fn with_clone_files(self, files: Vec<(&str, &str)>) -> Self {
        *self.git.clone_files.lock().unwrap() = files
            .into_iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self
    }

    pub fn with_git_missing(self) -> Self {
        self.git.missing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_push_error(self, message: &str) -> Self {
        *self.git.push_error.lock().unwrap() = Some(message.to_string());
        self
    }

    pub fn with_rewriter(mut self, rewriter: FakeRewriter) -> Self {
        self.rewriter = Arc::new(rewriter);
        self.rewriter_enabled = true;
        self
    }

    pub fn without_rewriter(mut self) -> Self {
        self.rewriter_enabled = false;
        self
    }

    pub fn with_translator(mut self, translator: FakeTranslator) -> Self {
        self.translator = Arc::new(translator);
        self
    }

    pub fn without_translator_key(mut self) -> Self {
        self.translator_key = None;
        self
    }

    /// A fresh context for the seeded job, as the runner would build it.
    pub fn context(&self) -> PipelineContext {
        let collaborators = build_collaborators(
            self.hosting.clone(),
            self.git.clone(),
            self.rewriter_enabled.then(|| self.rewriter.clone()),
            self.translator.clone(),
            self.translator_key.clone(),
        );
        PipelineContext::new(
            self.seed.clone(),
            &self.credentials,
            self.hosting.clone(),
            &collaborators,
            self.settings.clone(),
            JobLogger::new(self.store.clone(), self.seed.id.clone()),
        )
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.settings.work_root.join(&self.seed.id).join("repo")
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.repo_dir().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.repo_dir().join(relative)).unwrap()
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.repo_dir().join(relative).exists()
    }

    /// The job as currently stored.
    pub async fn job(&self) -> Job {
        self.store.get_by_id(&self.seed.id).await.unwrap().unwrap()
    }
}
