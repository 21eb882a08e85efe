//! Windowed spectator vote aggregation.
//!
//! Votes accumulate per agent inside a fixed-length window. A player
//! has at most one pending vote per agent; re-voting overwrites the
//! earlier choice in place. When the window elapses the manager
//! resolves each agent's ballot to the plurality action and starts a
//! fresh window. Ballots keep actions in first-submission order, so a
//! tie resolves to the action that reached the winning count first.
//!
//! The clock is injected (`Instant`) so tests can drive windows
//! without sleeping.

use std::collections::BTreeMap;
use std::time::Instant;

use arena_types::{AgentId, AgentVotes, PlayerId, VoteStateView, VoteTally};

/// One submitted vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub agent_id: AgentId,
    pub action: String,
    pub player_id: PlayerId,
}

/// The winning action per agent for a resolved window.
pub type ResolvedVotes = BTreeMap<AgentId, String>;

/// Collects votes for the current window and resolves it on expiry.
#[derive(Debug)]
pub struct VoteManager {
    window_id: u64,
    window_start: Instant,
    window_ms: u64,
    /// Per-agent ballots: `(player, action)` in submission order.
    ballots: BTreeMap<AgentId, Vec<(PlayerId, String)>>,
}

impl VoteManager {
    pub fn new(window_ms: u64, now: Instant) -> Self {
        Self {
            window_id: 0,
            window_start: now,
            window_ms,
            ballots: BTreeMap::new(),
        }
    }

    /// Record a vote in the current window. Idempotent per
    /// `(agent, player)`: a repeat vote replaces the earlier action in
    /// its original ballot slot.
    pub fn submit(&mut self, vote: Vote) {
        let ballot = self.ballots.entry(vote.agent_id).or_default();
        if let Some(slot) = ballot.iter_mut().find(|(player, _)| *player == vote.player_id) {
            slot.1 = vote.action;
        } else {
            ballot.push((vote.player_id, vote.action));
        }
    }

    /// Advance the window clock. When the window has elapsed, returns
    /// the resolved winners, bumps the window id, and clears ballots;
    /// otherwise returns `None`.
    pub fn tick_at(&mut self, now: Instant) -> Option<ResolvedVotes> {
        let elapsed_ms = now.duration_since(self.window_start).as_millis() as u64;
        if elapsed_ms < self.window_ms {
            return None;
        }

        let resolved: ResolvedVotes = self
            .ballots
            .iter()
            .filter_map(|(&agent_id, ballot)| {
                winning_action(ballot).map(|action| (agent_id, action))
            })
            .collect();

        self.window_id += 1;
        self.window_start = now;
        self.ballots.clear();

        Some(resolved)
    }

    /// Published view of the in-flight window: per-agent tallies sorted
    /// by count descending (ties keep first-submission order).
    pub fn state_at(&self, now: Instant) -> VoteStateView {
        let elapsed_ms = now.duration_since(self.window_start).as_millis() as u64;
        let time_remaining_ms = self.window_ms.saturating_sub(elapsed_ms);

        let agent_votes = self
            .ballots
            .iter()
            .map(|(&agent_id, ballot)| AgentVotes {
                agent_id,
                votes: ranked_tallies(ballot),
            })
            .collect();

        VoteStateView {
            window_id: self.window_id,
            time_remaining_ms,
            agent_votes,
        }
    }
}

/// Tally a ballot into `(action, count)` pairs in first-submission
/// order of the action strings.
fn tally(ballot: &[(PlayerId, String)]) -> Vec<VoteTally> {
    let mut tallies: Vec<VoteTally> = Vec::new();
    for (_, action) in ballot {
        if let Some(t) = tallies.iter_mut().find(|t| t.action == *action) {
            t.count += 1;
        } else {
            tallies.push(VoteTally {
                action: action.clone(),
                count: 1,
            });
        }
    }
    tallies
}

fn ranked_tallies(ballot: &[(PlayerId, String)]) -> Vec<VoteTally> {
    let mut tallies = tally(ballot);
    // Stable sort: equal counts keep first-submission order.
    tallies.sort_by(|a, b| b.count.cmp(&a.count));
    tallies
}

fn winning_action(ballot: &[(PlayerId, String)]) -> Option<String> {
    ranked_tallies(ballot).into_iter().next().map(|t| t.action)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn vote(agent: u32, player: PlayerId, action: &str) -> Vote {
        Vote {
            agent_id: AgentId(agent),
            action: action.to_owned(),
            player_id: player,
        }
    }

    #[test]
    fn window_does_not_resolve_early() {
        let start = Instant::now();
        let mut manager = VoteManager::new(1000, start);
        manager.submit(vote(0, PlayerId::new(), "flee"));
        assert!(manager
            .tick_at(start + Duration::from_millis(999))
            .is_none());
    }

    #[test]
    fn plurality_wins_and_ballot_clears() {
        let start = Instant::now();
        let mut manager = VoteManager::new(1000, start);
        for _ in 0..3 {
            manager.submit(vote(0, PlayerId::new(), "attack X"));
        }
        for _ in 0..2 {
            manager.submit(vote(0, PlayerId::new(), "flee"));
        }

        let state = manager.state_at(start + Duration::from_millis(500));
        assert_eq!(state.window_id, 0);
        assert_eq!(
            state.agent_votes[0].votes,
            vec![
                VoteTally {
                    action: String::from("attack X"),
                    count: 3
                },
                VoteTally {
                    action: String::from("flee"),
                    count: 2
                },
            ]
        );

        let resolved = manager.tick_at(start + Duration::from_millis(1000)).unwrap();
        assert_eq!(resolved.get(&AgentId(0)).map(String::as_str), Some("attack X"));
        assert!(resolved.get(&AgentId(1)).is_none());

        let state = manager.state_at(start + Duration::from_millis(1000));
        assert_eq!(state.window_id, 1);
        assert!(state.agent_votes.is_empty());
        assert_eq!(state.time_remaining_ms, 1000);
    }

    #[test]
    fn revote_overwrites_per_player() {
        let start = Instant::now();
        let mut manager = VoteManager::new(1000, start);
        let player = PlayerId::new();
        manager.submit(vote(0, player, "flee"));
        manager.submit(vote(0, player, "attack X"));
        manager.submit(vote(0, PlayerId::new(), "flee"));

        // One player, one vote: attack 1 + flee 1, not flee 2. The
        // overwrite replaced the action in the first ballot slot, so
        // "attack X" now leads the tie in submission order.
        let resolved = manager.tick_at(start + Duration::from_millis(1000)).unwrap();
        assert_eq!(
            resolved.get(&AgentId(0)).map(String::as_str),
            Some("attack X")
        );
    }

    #[test]
    fn duplicate_vote_is_idempotent() {
        let start = Instant::now();
        let mut manager = VoteManager::new(1000, start);
        let player = PlayerId::new();
        manager.submit(vote(0, player, "loot"));
        manager.submit(vote(0, player, "loot"));
        manager.submit(vote(0, PlayerId::new(), "flee"));

        let state = manager.state_at(start);
        let tallies = &state.agent_votes[0].votes;
        assert_eq!(tallies.iter().find(|t| t.action == "loot").unwrap().count, 1);
    }

    #[test]
    fn tie_breaks_by_first_submission_order() {
        let start = Instant::now();
        let mut manager = VoteManager::new(1000, start);
        manager.submit(vote(0, PlayerId::new(), "flee"));
        manager.submit(vote(0, PlayerId::new(), "attack X"));
        manager.submit(vote(0, PlayerId::new(), "attack X"));
        manager.submit(vote(0, PlayerId::new(), "flee"));

        let resolved = manager.tick_at(start + Duration::from_millis(1500)).unwrap();
        assert_eq!(resolved.get(&AgentId(0)).map(String::as_str), Some("flee"));
    }

    #[test]
    fn windows_cycle_ids() {
        let start = Instant::now();
        let mut manager = VoteManager::new(100, start);
        manager.tick_at(start + Duration::from_millis(100)).unwrap();
        manager.tick_at(start + Duration::from_millis(200)).unwrap();
        assert_eq!(manager.state_at(start + Duration::from_millis(200)).window_id, 2);
    }
}
