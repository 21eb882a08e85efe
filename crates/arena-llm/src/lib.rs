//! LLM variant of the decision backend.
//!
//! Same capability as the rule-based backend, with a remote brain:
//! each decision renders a prompt from the agent's context, calls an
//! OpenAI-compatible chat-completions endpoint, and parses an
//! `ACTION:`/`REASON:` reply into a typed decision. A counted
//! semaphore caps in-flight remote calls, every call runs under a
//! deadline, and *any* failure (network, rate limit, malformed output,
//! timeout) releases the gate and falls back to the wrapped rule-based
//! backend -- a stuck remote manifests as rule-quality play, never as
//! a hang or an error out of `decide`.

pub mod backend;
pub mod client;
pub mod error;
pub mod parse;
pub mod prompt;

pub use backend::LlmBackend;
pub use client::{ChatRequest, CompletionApi, HttpChatClient};
pub use error::LlmError;
