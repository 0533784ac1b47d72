//! The seven pipeline steps.
//!
//! Each step reads and extends the [`PipelineContext`](crate::pipeline::PipelineContext)
//! and writes its own job log entries; the runner only brackets them with
//! start and completion entries.

mod clone;
mod commit_push;
mod open_pr;
mod scan;
mod setup_i18n;
mod transform;
mod translate;

pub use clone::CloneStep;
pub use commit_push::CommitPushStep;
pub use open_pr::OpenPrStep;
pub use scan::{ScanStep, DEFAULT_SOURCE_DIRS, DEFAULT_SOURCE_EXTENSIONS};
pub use setup_i18n::SetupI18nStep;
pub use transform::TransformStep;
pub use translate::TranslateStep;
