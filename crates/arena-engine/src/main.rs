//! The arena server binary.
//!
//! Wires the simulation core, decision backend, and publisher together
//! and drives the tick loop on a fixed cadence until the game ends.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `arena-config.yaml` (defaults if absent)
//! 3. Create the thinking-history store
//! 4. Create and initialize the world
//! 5. Select the decision backend (rule-based or gated LLM)
//! 6. Start the observer server with the initial snapshot
//! 7. Run the tick loop
//! 8. Log why the run ended

mod error;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use arena_core::config::{BackendKind, ThinkingStorageKind};
use arena_core::decision::{Decision, DecisionContext, ReflectionContext};
use arena_core::{
    DecisionBackend, RuleBasedBackend, SharedThinkingStore, SimulationConfig, World,
};
use arena_llm::LlmBackend;
use arena_observer::{spawn_observer, AppState, Command, TickFrame};
use arena_types::GamePhase;

use crate::error::EngineError;

/// Why the driver loop stopped.
#[derive(Debug)]
enum EndReason {
    /// One agent outlived everyone.
    Winner(String),
    /// Everyone died the same tick.
    Extinction,
    /// The configured tick bound was hit.
    MaxTicksReached,
    /// Ctrl-C. Outstanding decisions are dropped with the tick.
    Interrupted,
}

/// Either decision backend, selected at startup.
///
/// Enum dispatch keeps the tick loop monomorphic without boxing the
/// async trait.
enum EngineBackend {
    Rules(RuleBasedBackend),
    Llm(LlmBackend),
}

impl DecisionBackend for EngineBackend {
    async fn decide(&self, ctx: &DecisionContext) -> Decision {
        match self {
            Self::Rules(backend) => backend.decide(ctx).await,
            Self::Llm(backend) => backend.decide(ctx).await,
        }
    }

    async fn reflect(&self, ctx: &ReflectionContext) -> Option<String> {
        match self {
            Self::Rules(backend) => backend.reflect(ctx).await,
            Self::Llm(backend) => backend.reflect(ctx).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("arena-engine starting");

    // 2. Configuration.
    let config = load_config()?;
    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        grid_size = config.world.grid_size,
        agent_count = config.world.agent_count,
        tick_interval_ms = config.world.tick_interval_ms,
        voting_window_ms = config.voting.window_ms,
        "Configuration loaded"
    );

    // 3. Thinking-history store.
    let thinking = match config.thinking.storage {
        ThinkingStorageKind::InMemory => SharedThinkingStore::in_memory(),
        ThinkingStorageKind::Null => SharedThinkingStore::null(),
    };

    // 4. World.
    let mut world = World::new(config.clone(), thinking.clone());
    world.init().map_err(EngineError::from)?;
    info!(session = %world.session(), "World initialized");

    // 5. Decision backend.
    let backend = select_backend(&config)?;

    // 6. Observer server.
    let (state, mut command_rx) =
        AppState::new(world.full_sync(), thinking, world.session());
    let state = Arc::new(state);
    let _observer = spawn_observer(&config.server, Arc::clone(&state))
        .await
        .map_err(EngineError::from)?;
    info!(port = config.server.port, "Observer started");

    // 7. Tick loop.
    let mut interval =
        tokio::time::interval(Duration::from_millis(config.world.tick_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let end_reason = loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = tokio::signal::ctrl_c() => break EndReason::Interrupted,
        }

        // Inbound subscriber intents land before the tick.
        while let Ok(command) = command_rx.try_recv() {
            match command {
                Command::Vote(vote) => world.submit_vote(vote),
            }
        }

        let report = world.tick(&backend).await.map_err(EngineError::from)?;
        state.update_snapshot(world.full_sync()).await;
        state.broadcast(TickFrame::from_report(
            &report,
            config.server.delta_broadcast,
        ));

        if world.phase() == GamePhase::Finished {
            break match world
                .winner()
                .and_then(|id| {
                    report
                        .agents_full
                        .iter()
                        .find(|a| a.id == id)
                        .map(|a| a.name.clone())
                }) {
                Some(name) => EndReason::Winner(name),
                None => EndReason::Extinction,
            };
        }

        if let Some(max_ticks) = config.world.max_ticks
            && report.tick >= max_ticks
        {
            break EndReason::MaxTicksReached;
        }
    };

    // 8. End logging. The observer keeps serving the final snapshot
    // until the process exits.
    match &end_reason {
        EndReason::Winner(name) => info!(winner = name, tick = world.tick, "Game over"),
        EndReason::Extinction => info!(tick = world.tick, "Game over with no survivor"),
        EndReason::MaxTicksReached => info!(tick = world.tick, "Tick limit reached"),
        EndReason::Interrupted => info!(tick = world.tick, "Interrupted, shutting down"),
    }

    Ok(())
}

/// Load `arena-config.yaml` from the working directory, falling back
/// to defaults when the file is absent.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new("arena-config.yaml");
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path).map_err(EngineError::from)?)
    } else {
        info!("Config file not found, using defaults");
        Ok(SimulationConfig::default())
    }
}

/// Pick the decision backend. The LLM backend needs an API key; when
/// it is selected without one, play degrades to rules with a warning
/// instead of failing startup.
fn select_backend(config: &SimulationConfig) -> Result<EngineBackend, EngineError> {
    match config.backend.kind {
        BackendKind::RuleBased => {
            info!("Using rule-based decision backend");
            Ok(EngineBackend::Rules(RuleBasedBackend::new()))
        }
        BackendKind::Llm => {
            if config.backend.llm.api_key.is_empty() {
                warn!("LLM backend selected but no API key configured, using rules");
                return Ok(EngineBackend::Rules(RuleBasedBackend::new()));
            }
            let backend = LlmBackend::from_config(
                &config.backend.llm,
                config.world.decision_timeout_ms,
            )
            .map_err(EngineError::from)?;
            info!(
                model = config.backend.llm.model,
                max_concurrency = config.backend.llm.max_concurrency,
                "Using LLM decision backend"
            );
            Ok(EngineBackend::Llm(backend))
        }
    }
}
