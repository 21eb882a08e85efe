//! Bounded store of per-agent reasoning artifacts.
//!
//! Each `(session, agent)` pair keeps a FIFO ring of recent
//! [`ThinkingProcess`] entries; sessions themselves are evicted LRU by
//! last store time. The `Null` variant is the safe default when
//! persistence of reasoning is disabled: every operation is a no-op.
//!
//! The store is shared between the world (writes, one per decision)
//! and the publisher (reads, on `thinking.request`), so the public
//! handle is a cheap `Arc<Mutex<..>>` wrapper with short critical
//! sections.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use arena_types::{AgentId, SessionId, ThinkingProcess};

/// Per-(session, agent) ring capacity.
const MAX_ENTRIES_PER_AGENT: usize = 50;

/// Maximum retained sessions; least recently stored-to is evicted.
const MAX_SESSIONS: usize = 10;

#[derive(Debug, Default)]
struct SessionSlot {
    agents: HashMap<AgentId, VecDeque<ThinkingProcess>>,
    /// Monotonic recency stamp, bumped on every store.
    last_used: u64,
}

/// In-memory thinking store with the bounds above.
#[derive(Debug, Default)]
pub struct InMemoryThinkingStore {
    sessions: HashMap<SessionId, SessionSlot>,
    clock: u64,
}

impl InMemoryThinkingStore {
    fn store(&mut self, session: SessionId, agent: AgentId, thinking: ThinkingProcess) {
        self.clock += 1;
        let clock = self.clock;

        if !self.sessions.contains_key(&session) && self.sessions.len() >= MAX_SESSIONS {
            if let Some((&oldest, _)) = self
                .sessions
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
            {
                self.sessions.remove(&oldest);
            }
        }

        let slot = self.sessions.entry(session).or_default();
        slot.last_used = clock;

        let ring = slot.agents.entry(agent).or_default();
        if ring.len() >= MAX_ENTRIES_PER_AGENT {
            ring.pop_front();
        }
        ring.push_back(thinking);
    }

    fn history(&self, session: SessionId, agent: AgentId, limit: usize) -> Vec<ThinkingProcess> {
        self.sessions
            .get(&session)
            .and_then(|slot| slot.agents.get(&agent))
            .map(|ring| ring.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    fn clear_session(&mut self, session: SessionId) {
        self.sessions.remove(&session);
    }

    fn count(&self, session: SessionId, agent: AgentId) -> usize {
        self.sessions
            .get(&session)
            .and_then(|slot| slot.agents.get(&agent))
            .map_or(0, VecDeque::len)
    }
}

/// Storage selection, dispatched by variant.
#[derive(Debug)]
pub enum ThinkingStore {
    InMemory(InMemoryThinkingStore),
    /// Discards writes, answers reads with nothing.
    Null,
}

/// Cloneable handle shared by the world and the publisher.
#[derive(Debug, Clone)]
pub struct SharedThinkingStore {
    inner: Arc<Mutex<ThinkingStore>>,
}

impl SharedThinkingStore {
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ThinkingStore::InMemory(
                InMemoryThinkingStore::default(),
            ))),
        }
    }

    pub fn null() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ThinkingStore::Null)),
        }
    }

    /// Record one reasoning artifact.
    pub fn store(&self, session: SessionId, agent: AgentId, thinking: ThinkingProcess) {
        let Ok(mut guard) = self.inner.lock() else {
            return; // poisoned mutex -- drop the artifact rather than block
        };
        if let ThinkingStore::InMemory(store) = &mut *guard {
            store.store(session, agent, thinking);
        }
    }

    /// Newest-first history for `(session, agent)`, at most `limit`.
    pub fn history(&self, session: SessionId, agent: AgentId, limit: usize) -> Vec<ThinkingProcess> {
        let Ok(guard) = self.inner.lock() else {
            return Vec::new();
        };
        match &*guard {
            ThinkingStore::InMemory(store) => store.history(session, agent, limit),
            ThinkingStore::Null => Vec::new(),
        }
    }

    /// Drop all history for a session (world re-init).
    pub fn clear_session(&self, session: SessionId) {
        let Ok(mut guard) = self.inner.lock() else {
            return;
        };
        if let ThinkingStore::InMemory(store) = &mut *guard {
            store.clear_session(session);
        }
    }

    /// Number of retained entries for `(session, agent)`.
    pub fn count(&self, session: SessionId, agent: AgentId) -> usize {
        let Ok(guard) = self.inner.lock() else {
            return 0;
        };
        match &*guard {
            ThinkingStore::InMemory(store) => store.count(session, agent),
            ThinkingStore::Null => 0,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn artifact(label: &str) -> ThinkingProcess {
        ThinkingProcess {
            action: label.to_owned(),
            reasoning: String::from("because"),
            prompt: None,
            raw_response: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let store = SharedThinkingStore::in_memory();
        let session = SessionId::new();
        let agent = AgentId(0);
        for i in 0..5 {
            store.store(session, agent, artifact(&format!("a{i}")));
        }
        let history = store.history(session, agent, 3);
        let labels: Vec<&str> = history.iter().map(|t| t.action.as_str()).collect();
        assert_eq!(labels, vec!["a4", "a3", "a2"]);
    }

    #[test]
    fn per_agent_ring_is_fifo_bounded() {
        let store = SharedThinkingStore::in_memory();
        let session = SessionId::new();
        let agent = AgentId(1);
        for i in 0..(MAX_ENTRIES_PER_AGENT + 10) {
            store.store(session, agent, artifact(&format!("a{i}")));
        }
        assert_eq!(store.count(session, agent), MAX_ENTRIES_PER_AGENT);
        let oldest_kept = store
            .history(session, agent, MAX_ENTRIES_PER_AGENT)
            .pop()
            .unwrap();
        assert_eq!(oldest_kept.action, "a10");
    }

    #[test]
    fn sessions_evict_lru() {
        let store = SharedThinkingStore::in_memory();
        let agent = AgentId(0);
        let first = SessionId::new();
        store.store(first, agent, artifact("early"));

        let mut later = Vec::new();
        for _ in 0..MAX_SESSIONS {
            let session = SessionId::new();
            store.store(session, agent, artifact("x"));
            later.push(session);
        }

        // `first` was the least recently used and got evicted.
        assert_eq!(store.count(first, agent), 0);
        for session in later {
            assert_eq!(store.count(session, agent), 1);
        }
    }

    #[test]
    fn clear_session_removes_all_agents() {
        let store = SharedThinkingStore::in_memory();
        let session = SessionId::new();
        store.store(session, AgentId(0), artifact("a"));
        store.store(session, AgentId(1), artifact("b"));
        store.clear_session(session);
        assert_eq!(store.count(session, AgentId(0)), 0);
        assert!(store.history(session, AgentId(1), 10).is_empty());
    }

    #[test]
    fn null_store_is_a_no_op() {
        let store = SharedThinkingStore::null();
        let session = SessionId::new();
        store.store(session, AgentId(0), artifact("a"));
        assert_eq!(store.count(session, AgentId(0)), 0);
        assert!(store.history(session, AgentId(0), 10).is_empty());
    }
}
