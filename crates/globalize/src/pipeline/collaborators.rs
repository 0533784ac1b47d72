use std::sync::Arc;

use secrecy::SecretString;

use crate::config::AgentConfig;
use crate::error::ConfigError;
use crate::framework::FrameworkRegistry;
use crate::git::{GitCli, GitClient};
use crate::github::{GitHubConnector, HostingConnector};
use crate::llm::{CodeRewriter, GeminiRewriter};
use crate::scanner::{SourceParser, TolerantParser};
use crate::translator::{LingoCli, TranslationCli};

/// External systems a run talks to, built once and shared by every run.
///
/// The hosting client is the exception: it depends on the caller's token, so
/// only its connector lives here and each run connects its own client.
#[derive(Clone)]
pub struct Collaborators {
    pub connector: Arc<dyn HostingConnector>,
    pub git: Arc<dyn GitClient>,
    /// `None` when no rewriter key is configured; transform is then skipped.
    pub rewriter: Option<Arc<dyn CodeRewriter>>,
    pub translator: Arc<dyn TranslationCli>,
    /// `None` when no translation key is configured; translate is then skipped.
    pub translator_key: Option<SecretString>,
    /// Hosting token used when the caller supplies none.
    pub fallback_token: Option<SecretString>,
    pub parser: Arc<dyn SourceParser>,
    pub frameworks: Arc<FrameworkRegistry>,
}

impl Collaborators {
    /// Production wiring from the agent configuration.
    pub fn from_config(config: &AgentConfig) -> Result<Self, ConfigError> {
        let fallback_token = config
            .github
            .token_source()
            .resolve()
            .map_err(|source| ConfigError::Secret {
                field: "github.token",
                source,
            })?;

        let rewriter_key = config
            .rewriter
            .api_key_source()
            .resolve()
            .map_err(|source| ConfigError::Secret {
                field: "rewriter.apiKey",
                source,
            })?;
        let rewriter = match rewriter_key {
            Some(key) => {
                let client =
                    GeminiRewriter::new(&key, &config.rewriter.model, &config.rewriter.base_url)
                        .map_err(|e| ConfigError::Validation {
                            message: format!("rewriter: {}", e),
                        })?;
                Some(Arc::new(client) as Arc<dyn CodeRewriter>)
            }
            None => None,
        };

        let translator_key = config
            .translator
            .api_key_source()
            .resolve()
            .map_err(|source| ConfigError::Secret {
                field: "translator.apiKey",
                source,
            })?;

        Ok(Self {
            connector: Arc::new(GitHubConnector::new(config.github.api_base_url.clone())),
            git: Arc::new(GitCli::default()),
            rewriter,
            translator: Arc::new(LingoCli::new(
                config.translator.program.clone(),
                config.translator.args.clone(),
            )),
            translator_key,
            fallback_token,
            parser: Arc::new(TolerantParser),
            frameworks: Arc::new(FrameworkRegistry::standard()),
        })
    }
}
