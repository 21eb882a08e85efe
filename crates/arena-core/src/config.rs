//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `arena-config.yaml` at the
//! project root. Every field has a default, so a missing file or an
//! empty document yields a playable world. Secrets come from the
//! environment: `ARENA_LLM_API_KEY` overrides `backend.llm.api_key`.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (grid, population, timing).
    #[serde(default)]
    pub world: WorldConfig,

    /// Shrinking-zone parameters.
    #[serde(default)]
    pub zone: ZoneConfig,

    /// Spectator voting parameters.
    #[serde(default)]
    pub voting: VotingConfig,

    /// Decision backend selection and LLM settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Thinking-history storage selection.
    #[serde(default)]
    pub thinking: ThinkingConfig,

    /// Publisher HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.backend.llm.apply_env_overrides();
        Ok(config)
    }
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for map generation and the world's own rolls.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Side length of the square tile grid.
    #[serde(default = "default_grid_size")]
    pub grid_size: u32,

    /// Number of agents spawned at init.
    #[serde(default = "default_agent_count")]
    pub agent_count: u32,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Per-call decision deadline. Must stay below the tick interval;
    /// a call that misses it falls back.
    #[serde(default = "default_decision_timeout_ms")]
    pub decision_timeout_ms: u64,

    /// Fraction of tiles blocked at init.
    #[serde(default = "default_obstacle_density")]
    pub obstacle_density: f64,

    /// Manhattan radius of agent perception.
    #[serde(default = "default_vision_range")]
    pub vision_range: i32,

    /// Stop the driver after this many ticks (`None` = run to a winner).
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            grid_size: default_grid_size(),
            agent_count: default_agent_count(),
            tick_interval_ms: default_tick_interval_ms(),
            decision_timeout_ms: default_decision_timeout_ms(),
            obstacle_density: default_obstacle_density(),
            vision_range: default_vision_range(),
            max_ticks: None,
        }
    }
}

/// Shrinking-zone configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ZoneConfig {
    /// Ticks between border decrements.
    #[serde(default = "default_shrink_interval_ticks")]
    pub shrink_interval_ticks: u64,

    /// Floor for the shrinking border.
    #[serde(default = "default_min_border")]
    pub min_border: i32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            shrink_interval_ticks: default_shrink_interval_ticks(),
            min_border: default_min_border(),
        }
    }
}

/// Spectator voting configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VotingConfig {
    /// Vote window length in milliseconds.
    #[serde(default = "default_voting_window_ms")]
    pub window_ms: u64,
}

impl Default for VotingConfig {
    fn default() -> Self {
        Self {
            window_ms: default_voting_window_ms(),
        }
    }
}

/// Which decision backend drives agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Deterministic priority rules; no network.
    RuleBased,
    /// Remote chat completion with rule-based fallback.
    Llm,
}

/// Decision backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BackendConfig {
    /// Selected backend. The LLM backend silently degrades to
    /// rule-based when no API key is configured.
    #[serde(default = "default_backend_kind")]
    pub kind: BackendKind,

    /// LLM connection settings, used only when `kind` is `llm`.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            llm: LlmConfig::default(),
        }
    }
}

/// Remote LLM settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LlmConfig {
    /// API key. Empty means "not configured". Overridden by the
    /// `ARENA_LLM_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: String,

    /// Remote model id.
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Chat-completions base URL.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Size of the concurrency gate: at most this many in-flight
    /// remote calls across all agents.
    #[serde(default = "default_llm_max_concurrency")]
    pub max_concurrency: usize,

    /// Sampling temperature.
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,
}

impl LlmConfig {
    /// Apply environment overrides for secrets.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("ARENA_LLM_API_KEY")
            && !key.is_empty()
        {
            self.api_key = key;
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            max_concurrency: default_llm_max_concurrency(),
            temperature: default_llm_temperature(),
        }
    }
}

/// Thinking-history storage selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThinkingStorageKind {
    /// Bounded in-memory store (per-agent ring, session LRU).
    InMemory,
    /// No-op store; history requests return nothing.
    Null,
}

/// Thinking-history configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ThinkingConfig {
    #[serde(default = "default_thinking_storage")]
    pub storage: ThinkingStorageKind,
}

impl Default for ThinkingConfig {
    fn default() -> Self {
        Self {
            storage: default_thinking_storage(),
        }
    }
}

/// Publisher HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_server_host")]
    pub host: String,

    /// TCP port to listen on.
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Allowed CORS origins. Empty allows any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Broadcast agents as per-tick deltas instead of full lists.
    #[serde(default = "default_true")]
    pub delta_broadcast: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
            allowed_origins: Vec::new(),
            delta_broadcast: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    String::from("arena")
}

const fn default_seed() -> u64 {
    42
}

const fn default_grid_size() -> u32 {
    20
}

const fn default_agent_count() -> u32 {
    10
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_decision_timeout_ms() -> u64 {
    800
}

const fn default_obstacle_density() -> f64 {
    0.15
}

const fn default_vision_range() -> i32 {
    4
}

const fn default_shrink_interval_ticks() -> u64 {
    30
}

const fn default_min_border() -> i32 {
    6
}

const fn default_voting_window_ms() -> u64 {
    30_000
}

const fn default_backend_kind() -> BackendKind {
    BackendKind::RuleBased
}

fn default_llm_model() -> String {
    String::from("deepseek-chat")
}

fn default_llm_base_url() -> String {
    String::from("https://api.deepseek.com/v1")
}

const fn default_llm_max_concurrency() -> usize {
    10
}

const fn default_llm_temperature() -> f64 {
    0.7
}

const fn default_thinking_storage() -> ThinkingStorageKind {
    ThinkingStorageKind::InMemory
}

fn default_server_host() -> String {
    String::from("0.0.0.0")
}

const fn default_server_port() -> u16 {
    8080
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config.world.grid_size, 20);
        assert_eq!(config.world.agent_count, 10);
        assert_eq!(config.voting.window_ms, 30_000);
        assert_eq!(config.zone.min_border, 6);
        assert_eq!(config.backend.kind, BackendKind::RuleBased);
        assert_eq!(config.thinking.storage, ThinkingStorageKind::InMemory);
    }

    #[test]
    fn partial_document_overrides_selected_fields() {
        let yaml = r"
world:
  grid_size: 32
  agent_count: 4
backend:
  kind: llm
  llm:
    model: test-model
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.grid_size, 32);
        assert_eq!(config.world.agent_count, 4);
        assert_eq!(config.world.tick_interval_ms, 1000);
        assert_eq!(config.backend.kind, BackendKind::Llm);
        assert_eq!(config.backend.llm.model, "test-model");
        assert_eq!(config.backend.llm.max_concurrency, 10);
    }

    #[test]
    fn invalid_yaml_is_rejected() {
        assert!(SimulationConfig::parse("world: [not a map").is_err());
    }
}
