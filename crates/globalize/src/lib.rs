pub mod agent;
pub mod config;
pub mod db;
pub mod error;
pub mod framework;
pub mod git;
pub mod github;
pub mod job;
pub mod llm;
pub mod logging;
pub mod pipeline;
mod process;
pub mod sanitize;
pub mod scanner;
pub mod secrets;
pub mod steps;
pub mod store;
pub mod translator;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::Agent;
pub use config::{load_config, AgentConfig};
pub use error::{ConfigError, GlobalizeError, Result};
pub use job::{Job, JobStats, JobStatus, LogEntry, LogLevel, NewJob};
pub use pipeline::{Credentials, Pipeline, PipelineConfig, PipelineContext, PipelineError, RunOutcome};
pub use scanner::{StringHit, StringHitKind};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
pub use store::{CancellationProbe, JobStore, MemoryJobStore, SqliteJobStore};
