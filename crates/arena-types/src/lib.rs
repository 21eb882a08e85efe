//! Shared types for the arena battle-royale simulation.
//!
//! Every type that crosses a crate boundary or the wire lives here:
//!
//! - [`ids`] -- strongly-typed identifier newtypes.
//! - [`enums`] -- closed vocabularies (action states, event kinds, ...).
//! - [`structs`] -- snapshot and detail records published to subscribers.
//! - [`messages`] -- the WebSocket protocol envelope enums.
//!
//! All wire-visible types derive `serde` traits and `ts_rs::TS` so the
//! browser client's bindings stay in lockstep with the server.

pub mod enums;
pub mod ids;
pub mod messages;
pub mod structs;

pub use enums::{ActionState, DecisionKind, EventKind, GamePhase, MemoryKind};
pub use ids::{AgentId, ItemId, PlayerId, SessionId};
pub use messages::{AgentsSync, ClientMessage, ServerMessage};
pub use structs::{
    AgentDelta, AgentDetail, AgentPath, AgentVotes, FullSync, GameEvent, Item, ThinkingProcess,
    TileMapWire, VoteTally, VoteStateView, Waypoint, WorldStateView,
};
