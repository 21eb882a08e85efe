//! Per-tick broadcast frames.
//!
//! The engine turns each [`TickReport`] into one [`TickFrame`]: the
//! ordered message batch every subscriber receives, plus the full
//! details of changed agents for follower pushes. Frames are broadcast
//! as a unit so two ticks can never interleave on a socket, and every
//! subscriber observes ticks in non-decreasing order.

use arena_core::TickReport;
use arena_types::{AgentDetail, AgentId, AgentsSync, ServerMessage};

/// One tick's outbound batch.
#[derive(Debug, Clone)]
pub struct TickFrame {
    pub tick: u64,
    /// Ordered messages for every subscriber: world header, agent
    /// sync, events (when any), vote state, and paths (always, so
    /// stale overlays clear).
    pub messages: Vec<ServerMessage>,
    /// Full form of every agent whose fingerprint changed this tick;
    /// socket tasks push these to matching followers.
    pub updated: Vec<AgentDetail>,
}

impl TickFrame {
    /// Project a tick report into its broadcast form.
    ///
    /// `delta_mode` selects the `sync.agents` payload: per-tick deltas
    /// (the default) or the full agent list.
    pub fn from_report(report: &TickReport, delta_mode: bool) -> Self {
        let tick = report.tick;

        let sync = if delta_mode {
            AgentsSync::Delta {
                agents: report.changed.clone(),
            }
        } else {
            AgentsSync::Full {
                agents: report.agents_full.clone(),
            }
        };

        let mut messages = vec![
            ServerMessage::SyncWorld(report.world),
            ServerMessage::SyncAgents { tick, sync },
        ];
        if !report.events.is_empty() {
            messages.push(ServerMessage::SyncEvents {
                tick,
                events: report.events.clone(),
            });
        }
        messages.push(ServerMessage::VoteState(report.votes.clone()));
        messages.push(ServerMessage::SyncPaths {
            tick,
            paths: report.paths.clone(),
        });

        let changed_ids: Vec<AgentId> = report.changed.iter().map(|d| d.id).collect();
        let updated = report
            .agents_full
            .iter()
            .filter(|a| changed_ids.contains(&a.id))
            .cloned()
            .collect();

        Self {
            tick,
            messages,
            updated,
        }
    }
}
