//! Snapshot and detail records published to subscribers.
//!
//! These are projections of the simulation's internal state: the world
//! owns the mutable entities, and each tick produces immutable copies
//! of these records for fan-out. Nothing here refers back into the
//! world -- relationships are sets of [`AgentId`], never references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{ActionState, EventKind, GamePhase};
use crate::ids::{AgentId, ItemId};

// ---------------------------------------------------------------------------
// Grid primitives
// ---------------------------------------------------------------------------

/// An integer grid coordinate. Also the unit of a path: consecutive
/// path waypoints are 4-adjacent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Waypoint {
    pub x: i32,
    pub y: i32,
}

impl Waypoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance to another coordinate.
    pub const fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// Compact wire form of the tile grid: one byte per cell in row-major
/// order (y outer, x inner), using the same byte layout as the binary
/// map codec (bits 0-1 tile kind, bits 2-7 weight).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TileMapWire {
    pub width: u32,
    pub height: u32,
    pub cells: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// A lootable item on the ground. Exists from spawn until an agent
/// loots it; looting grants `bonus` attack and sets the agent's weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Item {
    pub id: ItemId,
    pub x: i32,
    pub y: i32,
    /// Weapon name, e.g. `"sword"`.
    pub kind: String,
    /// Attack bonus granted on loot.
    pub bonus: i32,
}

// ---------------------------------------------------------------------------
// Agents (published forms)
// ---------------------------------------------------------------------------

/// Full public form of an agent, sent in `sync.full`, `agent.detail`,
/// and full-mode `sync.agents`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentDetail {
    pub id: AgentId,
    pub name: String,
    pub personality: String,
    pub description: String,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub weapon: Option<String>,
    pub kill_count: u32,
    pub x: i32,
    pub y: i32,
    pub alive: bool,
    pub action_state: ActionState,
    pub alliances: Vec<AgentId>,
    pub enemies: Vec<AgentId>,
    pub current_action: Option<String>,
    pub thinking: Option<ThinkingProcess>,
}

/// Minimal per-tick agent update. An agent appears in a delta only when
/// its `(x, y, hp, alive, action_state)` fingerprint changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentDelta {
    pub id: AgentId,
    pub x: i32,
    pub y: i32,
    pub hp: i32,
    pub alive: bool,
    pub action_state: ActionState,
}

/// The waypoints an agent is currently following, for client-side
/// path rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentPath {
    pub agent_id: AgentId,
    pub waypoints: Vec<Waypoint>,
}

// ---------------------------------------------------------------------------
// Reasoning artifacts
// ---------------------------------------------------------------------------

/// One decision's reasoning artifact. For LLM decisions the prompt and
/// raw response are retained (truncated); rule decisions carry neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ThinkingProcess {
    /// Human-readable action label, e.g. `"attack Rex"`.
    pub action: String,
    pub reasoning: String,
    pub prompt: Option<String>,
    pub raw_response: Option<String>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An append-only game event. Events are collected during a tick and
/// published once as an ordered batch; they are never mutated after
/// emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GameEvent {
    pub kind: EventKind,
    pub tick: u64,
    pub message: String,
    pub agent_ids: Vec<AgentId>,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

/// One action's tally within an agent's ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteTally {
    pub action: String,
    pub count: u32,
}

/// Ranked tallies for one agent, sorted by count descending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentVotes {
    pub agent_id: AgentId,
    pub votes: Vec<VoteTally>,
}

/// Published view of the current vote window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct VoteStateView {
    pub window_id: u64,
    pub time_remaining_ms: u64,
    pub agent_votes: Vec<AgentVotes>,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// Lightweight world header broadcast every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldStateView {
    pub tick: u64,
    pub alive_count: u32,
    pub shrink_border: i32,
    pub phase: GamePhase,
    pub zone_center: Waypoint,
    pub winner: Option<AgentId>,
}

/// Complete state snapshot sent to a subscriber on connect (and on
/// resync). Events are capped to the most recent 20.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FullSync {
    pub world: WorldStateView,
    pub agents: Vec<AgentDetail>,
    pub items: Vec<Item>,
    pub votes: VoteStateView,
    pub events: Vec<GameEvent>,
    pub paths: Vec<AgentPath>,
    pub tile_map: TileMapWire,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = Waypoint::new(1, 2);
        let b = Waypoint::new(4, -1);
        assert_eq!(a.manhattan(b), 6);
        assert_eq!(b.manhattan(a), 6);
        assert_eq!(a.manhattan(a), 0);
    }

    #[test]
    fn agent_delta_roundtrips_through_json() {
        let delta = AgentDelta {
            id: AgentId(3),
            x: 5,
            y: 9,
            hp: 42,
            alive: true,
            action_state: ActionState::Exploring,
        };
        let json = serde_json::to_string(&delta).unwrap();
        let back: AgentDelta = serde_json::from_str(&json).unwrap();
        assert_eq!(back, delta);
    }
}
