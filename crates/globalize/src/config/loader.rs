use std::path::Path;

use crate::config::schema::AgentConfig;
use crate::error::ConfigError;
use crate::job::is_language_code;
use crate::logging::LogFormat;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AgentConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<AgentConfig, ConfigError> {
    let config: AgentConfig = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

impl AgentConfig {
    /// Defaults overridden by `GLOBALIZE_*` variables and
    /// `GITHUB_BOT_USERNAME`. Credentials are not read here; they resolve
    /// through each service's env-var reference when the pipeline is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AgentConfig::default();

        if let Some(path) = env_value("GLOBALIZE_DATABASE_PATH") {
            config.database_path = Some(path);
        }
        if let Some(root) = env_value("GLOBALIZE_WORK_ROOT") {
            config.work_root = Some(root);
        }
        if let Some(languages) = env_value("GLOBALIZE_DEFAULT_LANGUAGES") {
            config.default_languages = languages
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(username) = env_value("GITHUB_BOT_USERNAME") {
            config.github.bot_username = username;
        }
        if let Some(url) = env_value("GLOBALIZE_GITHUB_API_URL") {
            config.github.api_base_url = url;
        }
        if let Some(branch) = env_value("GLOBALIZE_BRANCH_NAME") {
            config.github.branch_name = branch;
        }
        if let Some(model) = env_value("GLOBALIZE_GEMINI_MODEL") {
            config.rewriter.model = model;
        }
        if let Some(filter) = env_value("GLOBALIZE_LOG") {
            config.logging.filter = filter;
        }
        if let Some(format) = env_value("GLOBALIZE_LOG_FORMAT") {
            config.logging.format = match format.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" => LogFormat::Pretty,
                other => {
                    return Err(ConfigError::Validation {
                        message: format!(
                            "GLOBALIZE_LOG_FORMAT must be 'pretty' or 'json', got '{}'",
                            other
                        ),
                    })
                }
            };
        }

        validate_config(&config)?;
        Ok(config)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn validate_config(config: &AgentConfig) -> Result<(), ConfigError> {
    for language in &config.default_languages {
        if !is_language_code(language) {
            return Err(ConfigError::Validation {
                message: format!("Invalid language code in defaultLanguages: '{}'", language),
            });
        }
    }

    let github = &config.github;
    if github.branch_name.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "github.branchName must not be empty".to_string(),
        });
    }
    if github.bot_username.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "github.botUsername must not be empty".to_string(),
        });
    }
    if github.fork_poll_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "github.forkPollAttempts must be at least 1".to_string(),
        });
    }

    for (field, url) in [
        ("github.apiBaseUrl", &github.api_base_url),
        ("rewriter.baseUrl", &config.rewriter.base_url),
    ] {
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Validation {
                message: format!("{} must be an http(s) URL, got '{}'", field, url),
            });
        }
    }

    if config.translator.program.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "translator.program must not be empty".to_string(),
        });
    }

    Ok(())
}
