//! The WebSocket protocol between the publisher and its subscribers.
//!
//! Message-oriented and bidirectional. Every outbound message that is
//! tied to a simulation step carries the `tick` it belongs to, and a
//! subscriber observes ticks in strictly non-decreasing order. Inbound
//! messages never mutate world state directly -- the publisher tags and
//! forwards vote submissions, and answers the rest from snapshots.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ids::AgentId;
use crate::structs::{
    AgentDelta, AgentDetail, AgentPath, FullSync, GameEvent, ThinkingProcess, VoteStateView,
    WorldStateView,
};

/// Agent list broadcast, in one of two publisher-selected modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "mode", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AgentsSync {
    /// Every agent, full form.
    Full { agents: Vec<AgentDetail> },
    /// Only agents whose fingerprint changed since the previous tick.
    Delta { agents: Vec<AgentDelta> },
}

/// Server-to-subscriber messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ServerMessage {
    /// Complete state snapshot, sent on connect and on resync.
    #[serde(rename = "sync.full")]
    SyncFull(FullSync),

    /// World header for one tick.
    #[serde(rename = "sync.world")]
    SyncWorld(WorldStateView),

    /// Agent list (full or delta) for one tick.
    #[serde(rename = "sync.agents")]
    SyncAgents { tick: u64, sync: AgentsSync },

    /// The tick's ordered event batch. Only sent when non-empty.
    #[serde(rename = "sync.events")]
    SyncEvents { tick: u64, events: Vec<GameEvent> },

    /// All current agent paths. Sent every tick, even when empty, so
    /// clients can clear stale path overlays.
    #[serde(rename = "sync.paths")]
    SyncPaths { tick: u64, paths: Vec<AgentPath> },

    /// Current vote-window tallies.
    #[serde(rename = "vote.state")]
    VoteState(VoteStateView),

    /// Full state of one agent, sent to followers and inspectors.
    #[serde(rename = "agent.detail")]
    AgentDetailMsg { tick: u64, agent: AgentDetail },

    /// Reply to a thinking-history request, newest first.
    #[serde(rename = "thinking.history")]
    ThinkingHistory {
        agent_id: AgentId,
        entries: Vec<ThinkingProcess>,
    },
}

/// Subscriber-to-server messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "type", content = "data")]
#[ts(export, export_to = "bindings/")]
pub enum ClientMessage {
    /// Vote for an agent's next action. The server tags the vote with
    /// the connection's stable player id; the payload never carries one.
    #[serde(rename = "vote.submit")]
    VoteSubmit { agent_id: AgentId, action: String },

    /// One-shot request for an agent's full state.
    #[serde(rename = "agent.inspect")]
    AgentInspect { agent_id: AgentId },

    /// Follow an agent (`Some`) or stop following (`None`). A follower
    /// receives `agent.detail` whenever the agent changes.
    #[serde(rename = "agent.follow")]
    AgentFollow { agent_id: Option<AgentId> },

    /// Request recent reasoning artifacts for an agent.
    #[serde(rename = "thinking.request")]
    ThinkingRequest {
        agent_id: AgentId,
        limit: Option<usize>,
    },
}
