//! Closed vocabularies shared across the simulation and the wire.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Game lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle phase of a world. Once `Finished` is reached the world
/// stays finished until it is re-initialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum GamePhase {
    /// World constructed but `init` has not run.
    WaitingToStart,
    /// The tick loop is advancing the simulation.
    Running,
    /// At most one agent remains; `winner` is set (or `None` on a wipe).
    Finished,
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Coarse activity tag displayed next to an agent. `Dead` is entered
/// exactly when hp reaches 0 and never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum ActionState {
    Idle,
    Exploring,
    Fighting,
    Fleeing,
    Looting,
    Allying,
    Betraying,
    Dead,
}

/// The typed action a decision backend can choose for an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum DecisionKind {
    Attack,
    Flee,
    Ally,
    Betray,
    Loot,
    Explore,
    Rest,
}

impl DecisionKind {
    /// Lowercase label used in logs and `currentAction` text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attack => "attack",
            Self::Flee => "flee",
            Self::Ally => "ally",
            Self::Betray => "betray",
            Self::Loot => "loot",
            Self::Explore => "explore",
            Self::Rest => "rest",
        }
    }
}

/// What produced a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum MemoryKind {
    /// Something the agent saw or experienced directly.
    Observation,
    /// A periodic synthesis produced by the backend's `reflect`.
    Reflection,
    /// A stated intention.
    Plan,
    /// A resolved spectator vote delivered to the agent.
    InnerVoice,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Category of a game event published to spectators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    Kill,
    Alliance,
    Betrayal,
    Combat,
    Loot,
    ZoneShrink,
    Vote,
    GameOver,
    AgentSpawn,
}
