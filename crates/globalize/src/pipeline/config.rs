use std::path::PathBuf;
use std::time::Duration;

use crate::config::AgentConfig;

pub const DEFAULT_TARGET_LANGUAGES: &[&str] = &["es", "fr", "de", "ja", "zh"];
pub const DEFAULT_BRANCH_NAME: &str = "feat/i18n-lingo-dev";
pub const DEFAULT_COMMIT_MESSAGE: &str = "feat: add i18n support via Lingo.dev";
pub const DEFAULT_BOT_USERNAME: &str = "i18n-agent-bot";

/// Run-independent settings shared by every pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Each job works in `{work_root}/{job_id}`.
    pub work_root: PathBuf,
    pub default_languages: Vec<String>,
    pub source_locale: String,
    pub branch_name: String,
    pub commit_message: String,
    pub bot_username: String,
    pub fork_poll_attempts: u32,
    pub fork_poll_interval: Duration,
    pub clone_depth: Option<u32>,
    /// Callee whose arguments count as already translated.
    pub translation_fn: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: std::env::temp_dir().join("globalize"),
            default_languages: DEFAULT_TARGET_LANGUAGES
                .iter()
                .map(|l| l.to_string())
                .collect(),
            source_locale: "en".to_string(),
            branch_name: DEFAULT_BRANCH_NAME.to_string(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            fork_poll_attempts: 15,
            fork_poll_interval: Duration::from_secs(2),
            clone_depth: Some(1),
            translation_fn: "t".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &AgentConfig) -> Self {
        let defaults = Self::default();
        Self {
            work_root: config
                .work_root
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.work_root),
            default_languages: if config.default_languages.is_empty() {
                defaults.default_languages
            } else {
                config.default_languages.clone()
            },
            branch_name: config.github.branch_name.clone(),
            bot_username: config.github.bot_username.clone(),
            fork_poll_attempts: config.github.fork_poll_attempts,
            fork_poll_interval: Duration::from_secs(config.github.fork_poll_interval_secs),
            ..defaults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.default_languages, vec!["es", "fr", "de", "ja", "zh"]);
        assert_eq!(config.branch_name, "feat/i18n-lingo-dev");
        assert_eq!(config.clone_depth, Some(1));
        assert!(config.work_root.ends_with("globalize"));
    }

    #[test]
    fn test_from_config_overrides() {
        let agent = load_config_from_str(
            r#"{
                "workRoot": "/srv/globalize",
                "defaultLanguages": ["it", "pt"],
                "github": {"branchName": "i18n/setup", "forkPollAttempts": 3, "forkPollIntervalSecs": 0}
            }"#,
        )
        .unwrap();
        let config = PipelineConfig::from_config(&agent);
        assert_eq!(config.work_root, PathBuf::from("/srv/globalize"));
        assert_eq!(config.default_languages, vec!["it", "pt"]);
        assert_eq!(config.branch_name, "i18n/setup");
        assert_eq!(config.fork_poll_attempts, 3);
        assert_eq!(config.fork_poll_interval, Duration::ZERO);
        assert_eq!(config.bot_username, DEFAULT_BOT_USERNAME);
    }
}
