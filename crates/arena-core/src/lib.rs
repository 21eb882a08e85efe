//! Simulation core for the arena battle royale.
//!
//! The [`World`] owns all mutable state and advances it one tick at a
//! time: zone shrink, item spawns, vote resolution, a fan-out decision
//! pass over every living agent, decision execution, and the win check.
//! Everything a spectator sees is a projection produced at the end of a
//! tick; nothing outside this crate mutates world state.
//!
//! # Modules
//!
//! - [`agent`] -- the agent entity: stats, perception, movement.
//! - [`config`] -- typed configuration loaded from `arena-config.yaml`.
//! - [`decision`] -- the [`DecisionBackend`] capability and the
//!   rule-based implementation.
//! - [`memory`] -- bounded per-agent memory with scored retrieval.
//! - [`thinking`] -- bounded per-session store of reasoning artifacts.
//! - [`vote`] -- windowed spectator vote aggregation.
//! - [`world`] -- the tick loop and snapshot producers.
//!
//! [`World`]: world::World
//! [`DecisionBackend`]: decision::DecisionBackend

pub mod agent;
pub mod config;
pub mod decision;
pub mod memory;
pub mod thinking;
pub mod vote;
pub mod world;

pub use config::SimulationConfig;
pub use decision::{Decision, DecisionBackend, DecisionContext, RuleBasedBackend};
pub use thinking::SharedThinkingStore;
pub use world::{TickReport, World, WorldError};
