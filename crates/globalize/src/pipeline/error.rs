use thiserror::Error;

use crate::framework::FrameworkError;
use crate::git::GitError;
use crate::github::HostingError;
use crate::llm::RewriteError;
use crate::store::StoreError;

/// Failure of a single step. Display text is what ends up on the job.
#[derive(Error, Debug)]
pub enum StepError {
    /// Precondition on the repository or identity; the message is shown as-is.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Framework(#[from] FrameworkError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Hosting(#[from] HostingError),

    #[error(transparent)]
    Rewrite(#[from] RewriteError),

    /// External command exited unsuccessfully.
    #[error("{0}")]
    Command(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StepError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StepError::Io {
            context: context.into(),
            source,
        }
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The job store could not be reached before the run started.
    #[error("Pipeline is not configured: {0}")]
    Configuration(String),

    #[error("{0}")]
    AlreadyActive(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("{source}")]
    StepFailed {
        step: &'static str,
        #[source]
        source: StepError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PipelineError {
    /// Name of the step that failed, if the failure came from a step.
    pub fn step(&self) -> Option<&'static str> {
        match self {
            PipelineError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failure_displays_bare_message() {
        let err = PipelineError::StepFailed {
            step: "clone",
            source: StepError::Validation("Clone failed".to_string()),
        };
        assert_eq!(err.to_string(), "Clone failed");
        assert_eq!(err.step(), Some("clone"));
    }

    #[test]
    fn test_io_error_includes_context() {
        let err = StepError::io(
            "Failed to write messages/en.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to write messages/en.json: denied");
    }
}
