//! Error types for the engine binary.

use thiserror::Error;

/// Fatal startup or runtime errors. Anything recoverable is handled
/// inside the tick loop; these end the process.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded.
    #[error("config error: {source}")]
    Config {
        #[from]
        source: arena_core::config::ConfigError,
    },

    /// World initialization or an invariant check failed.
    #[error("world error: {source}")]
    World {
        #[from]
        source: arena_core::WorldError,
    },

    /// The LLM backend could not be constructed.
    #[error("llm backend error: {source}")]
    Llm {
        #[from]
        source: arena_llm::LlmError,
    },

    /// The observer server could not start.
    #[error("observer error: {source}")]
    Observer {
        #[from]
        source: arena_observer::ServerError,
    },
}
