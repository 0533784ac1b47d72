//! Tracing subscriber setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and either a
//! human-readable or JSON `fmt` layer, and bridges `log` records through
//! `tracing-log` so dependencies using the `log` facade end up in the same
//! output.

use serde::{Deserialize, Serialize};
use tracing_log::AsLog;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::GlobalizeError;

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info,globalize=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(config: &LoggingConfig) -> Result<(), GlobalizeError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .map_err(|e| GlobalizeError::Logging(e.to_string()))?;

    // `log` records above the filter's most verbose level are dropped early.
    let log_level: log::LevelFilter = filter
        .max_level_hint()
        .map(|level| level.as_log())
        .unwrap_or(log::LevelFilter::Trace);
    tracing_log::LogTracer::init_with_filter(log_level)
        .map_err(|e| GlobalizeError::Logging(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Pretty => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().with_target(true)),
        ),
        LogFormat::Json => tracing::subscriber::set_global_default(
            registry.with(fmt::layer().json().with_current_span(true)),
        ),
    };

    result.map_err(|e| GlobalizeError::Logging(e.to_string()))
}
