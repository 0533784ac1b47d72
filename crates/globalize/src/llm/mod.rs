//! LLM-backed code rewriting used by the transform step.

use async_trait::async_trait;
use thiserror::Error;

mod gemini;
pub mod prompt;
pub mod repair;

pub use gemini::{GeminiRewriter, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
pub use prompt::{build_transform_prompt, TransformRequest, SYSTEM_INSTRUCTION};
pub use repair::{parse_with_repairs, RepairError, TransformResponse};

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Rewriter request failed: {0}")]
    Transport(String),

    #[error("Rewriter API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rewriter returned no text")]
    EmptyResponse,
}

/// Text-in, text-out generation call.
#[async_trait]
pub trait CodeRewriter: Send + Sync {
    async fn generate_content(&self, prompt: &str) -> Result<String, RewriteError>;
}
