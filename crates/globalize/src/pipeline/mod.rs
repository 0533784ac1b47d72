//! Job pipeline engine.
//!
//! A run claims a pending job, then executes the fixed step sequence
//! (clone, scan, setup-i18n, transform, translate, commit-push, open-pr)
//! against a [`PipelineContext`]. Before each step the cancellation probe is
//! consulted; the first step error ends the run and is recorded on the job.

pub mod collaborators;
pub mod config;
pub mod context;
pub mod error;
pub mod logger;
pub mod runner;
pub mod step;

pub use collaborators::Collaborators;
pub use config::PipelineConfig;
pub use context::{Credentials, MessageCatalog, PipelineContext, PushTarget};
pub use error::{PipelineError, StepError};
pub use logger::JobLogger;
pub use runner::{Pipeline, RunOutcome, PIPELINE_LOG_STEP};
pub use step::{Step, StepName, StepRegistry};
