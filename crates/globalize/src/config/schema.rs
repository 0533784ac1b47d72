use serde::{Deserialize, Serialize};

use crate::github::DEFAULT_API_BASE_URL;
use crate::llm::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::logging::LoggingConfig;
use crate::pipeline::config::{DEFAULT_BOT_USERNAME, DEFAULT_BRANCH_NAME};
use crate::secrets::SecretSource;
use crate::translator::LINGO_API_KEY_ENV;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// SQLite file for jobs. Defaults to `~/.globalize/data/globalize.db`.
    #[serde(default)]
    pub database_path: Option<String>,
    /// Parent of every job's working directory.
    #[serde(default)]
    pub work_root: Option<String>,
    /// Target languages for jobs that name none.
    #[serde(default)]
    pub default_languages: Vec<String>,
    #[serde(default)]
    pub github: GitHubSettings,
    #[serde(default)]
    pub rewriter: RewriterSettings,
    #[serde(default)]
    pub translator: TranslatorSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubSettings {
    /// Fallback token for API calls when a run supplies none.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default = "default_token_env_var")]
    pub token_env_var: String,
    /// Account forks are created under when the run has no username.
    #[serde(default = "default_bot_username")]
    pub bot_username: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_branch_name")]
    pub branch_name: String,
    #[serde(default = "default_fork_poll_attempts")]
    pub fork_poll_attempts: u32,
    #[serde(default = "default_fork_poll_interval_secs")]
    pub fork_poll_interval_secs: u64,
}

fn default_token_env_var() -> String {
    "GITHUB_TOKEN".to_string()
}

fn default_bot_username() -> String {
    DEFAULT_BOT_USERNAME.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_branch_name() -> String {
    DEFAULT_BRANCH_NAME.to_string()
}

fn default_fork_poll_attempts() -> u32 {
    15
}

fn default_fork_poll_interval_secs() -> u64 {
    2
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            token_file: None,
            token_env_var: default_token_env_var(),
            bot_username: default_bot_username(),
            api_base_url: default_api_base_url(),
            branch_name: default_branch_name(),
            fork_poll_attempts: default_fork_poll_attempts(),
            fork_poll_interval_secs: default_fork_poll_interval_secs(),
        }
    }
}

impl GitHubSettings {
    pub fn token_source(&self) -> SecretSource {
        SecretSource {
            value: self.token.clone(),
            file: self.token_file.clone(),
            env_var: Some(self.token_env_var.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriterSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_gemini_env_var")]
    pub api_key_env_var: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

fn default_gemini_env_var() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_model() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_gemini_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}

impl Default for RewriterSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_gemini_env_var(),
            model: default_model(),
            base_url: default_gemini_base_url(),
        }
    }
}

impl RewriterSettings {
    pub fn api_key_source(&self) -> SecretSource {
        SecretSource {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env_var: Some(self.api_key_env_var.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatorSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_lingo_env_var")]
    pub api_key_env_var: String,
    /// Command run in the repository to produce locale files.
    #[serde(default = "default_program")]
    pub program: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_lingo_env_var() -> String {
    LINGO_API_KEY_ENV.to_string()
}

fn default_program() -> String {
    "npx".to_string()
}

fn default_args() -> Vec<String> {
    vec!["lingo.dev@latest".to_string(), "i18n".to_string()]
}

impl Default for TranslatorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_lingo_env_var(),
            program: default_program(),
            args: default_args(),
        }
    }
}

impl TranslatorSettings {
    pub fn api_key_source(&self) -> SecretSource {
        SecretSource {
            value: self.api_key.clone(),
            file: self.api_key_file.clone(),
            env_var: Some(self.api_key_env_var.clone()),
        }
    }
}
