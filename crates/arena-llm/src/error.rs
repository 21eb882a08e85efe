//! Error types for the LLM backend.

use thiserror::Error;

/// Failures inside the LLM decision pipeline. None of these escape
/// `decide`/`reflect`; they all route into the rule-based fallback.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The remote call failed: transport error, non-success status, or
    /// a response without extractable content.
    #[error("llm backend error: {0}")]
    Backend(String),

    /// The response text did not contain a parseable action.
    #[error("llm parse error: {0}")]
    Parse(String),

    /// A prompt template failed to compile or render.
    #[error("prompt template error: {source}")]
    Template {
        #[from]
        source: minijinja::Error,
    },
}
