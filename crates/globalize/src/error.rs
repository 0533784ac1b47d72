use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobalizeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Job store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Invalid job: {0}")]
    Job(#[from] crate::job::JobError),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("Agent is shutting down; no new runs are accepted")]
    ShuttingDown,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve secret for '{field}': {source}")]
    Secret {
        field: &'static str,
        #[source]
        source: crate::secrets::SecretError,
    },
}

pub type Result<T> = std::result::Result<T, GlobalizeError>;
