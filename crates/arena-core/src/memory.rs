//! Bounded per-agent memory with scored retrieval.
//!
//! Each agent carries a stream of [`MemoryEntry`] records. The stream
//! is bounded: when it overflows, the least important entries are
//! dropped. Retrieval scores every entry on recency, importance, and
//! keyword relevance; the relevance term is a pure function of
//! `(memory, query)` and can be swapped for embedding similarity
//! without touching anything else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use arena_types::MemoryKind;

/// Hard cap on stored entries.
const MAX_ENTRIES: usize = 100;

/// On overflow the stream keeps the most important 80% of the cap.
const TRIM_TO: usize = MAX_ENTRIES * 8 / 10;

/// Per-second exponential decay applied to the recency term.
const RECENCY_DECAY: f64 = 0.995;

/// Scoring weights: recency, importance, relevance.
const W_RECENCY: f64 = 0.3;
const W_IMPORTANCE: f64 = 0.4;
const W_RELEVANCE: f64 = 0.3;

/// One remembered fact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub text: String,
    pub kind: MemoryKind,
    /// Importance in `[1, 10]`; clamped on insert.
    pub importance: u8,
    pub timestamp: DateTime<Utc>,
}

/// A bounded, insertion-ordered memory stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryStream {
    entries: Vec<MemoryEntry>,
}

impl MemoryStream {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a memory, clamping importance to `[1, 10]` and trimming
    /// on overflow (importance-descending, keep [`TRIM_TO`]).
    pub fn add(&mut self, text: impl Into<String>, importance: u8, kind: MemoryKind) {
        self.add_at(text, importance, kind, Utc::now());
    }

    /// Like [`add`](Self::add) with an explicit timestamp (tests drive
    /// the clock through this).
    pub fn add_at(
        &mut self,
        text: impl Into<String>,
        importance: u8,
        kind: MemoryKind,
        timestamp: DateTime<Utc>,
    ) {
        self.entries.push(MemoryEntry {
            text: text.into(),
            kind,
            importance: importance.clamp(1, 10),
            timestamp,
        });

        if self.entries.len() > MAX_ENTRIES {
            // Stable sort keeps insertion order among equals.
            self.entries.sort_by(|a, b| b.importance.cmp(&a.importance));
            self.entries.truncate(TRIM_TO);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries in insertion order.
    pub fn recent(&self, n: usize) -> &[MemoryEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    /// The newest entry of the given kind.
    pub fn latest_of_kind(&self, kind: MemoryKind) -> Option<&MemoryEntry> {
        self.entries.iter().rev().find(|e| e.kind == kind)
    }

    /// Top-`k` entries for a query, scored by
    /// `0.3*recency + 0.4*(importance/10) + 0.3*relevance`.
    pub fn retrieve(&self, query: &str, k: usize) -> Vec<&MemoryEntry> {
        self.retrieve_at(query, k, Utc::now())
    }

    fn retrieve_at(&self, query: &str, k: usize, now: DateTime<Utc>) -> Vec<&MemoryEntry> {
        let mut scored: Vec<(f64, &MemoryEntry)> = self
            .entries
            .iter()
            .map(|entry| (score(entry, query, now), entry))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(k).map(|(_, e)| e).collect()
    }
}

/// Combined retrieval score in `[0, 1]`.
fn score(entry: &MemoryEntry, query: &str, now: DateTime<Utc>) -> f64 {
    let age_seconds = (now - entry.timestamp).num_seconds().max(0) as f64;
    let recency = RECENCY_DECAY.powf(age_seconds);
    let importance = f64::from(entry.importance) / 10.0;
    W_RECENCY * recency + W_IMPORTANCE * importance + W_RELEVANCE * relevance(entry, query)
}

/// Fraction of query words contained in the memory text,
/// case-insensitive, whitespace-tokenized.
fn relevance(entry: &MemoryEntry, query: &str) -> f64 {
    let text = entry.text.to_lowercase();
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let hits = words
        .iter()
        .filter(|w| text.contains(&w.to_lowercase()))
        .count();
    hits as f64 / words.len() as f64
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn importance_is_clamped() {
        let mut stream = MemoryStream::new();
        stream.add("too low", 0, MemoryKind::Observation);
        stream.add("too high", 99, MemoryKind::Observation);
        assert_eq!(stream.recent(2)[0].importance, 1);
        assert_eq!(stream.recent(2)[1].importance, 10);
    }

    #[test]
    fn overflow_keeps_most_important() {
        let mut stream = MemoryStream::new();
        for i in 0..=MAX_ENTRIES {
            // One high-importance entry among noise.
            let importance = if i == 3 { 10 } else { 2 };
            stream.add(format!("memory {i}"), importance, MemoryKind::Observation);
        }
        assert_eq!(stream.len(), TRIM_TO);
        assert!(stream
            .recent(TRIM_TO)
            .iter()
            .any(|e| e.text == "memory 3"));
    }

    #[test]
    fn recent_preserves_insertion_order() {
        let mut stream = MemoryStream::new();
        stream.add("first", 5, MemoryKind::Observation);
        stream.add("second", 5, MemoryKind::Plan);
        stream.add("third", 5, MemoryKind::Observation);
        let recent: Vec<&str> = stream.recent(2).iter().map(|e| e.text.as_str()).collect();
        assert_eq!(recent, vec!["second", "third"]);
    }

    #[test]
    fn retrieval_prefers_relevant_entries() {
        let now = Utc::now();
        let mut stream = MemoryStream::new();
        stream.add_at("saw a sword near the wall", 5, MemoryKind::Observation, now);
        stream.add_at("rested by the fire", 5, MemoryKind::Observation, now);
        let top = stream.retrieve_at("sword wall", 1, now);
        assert_eq!(top[0].text, "saw a sword near the wall");
    }

    #[test]
    fn retrieval_prefers_recent_over_stale() {
        let now = Utc::now();
        let mut stream = MemoryStream::new();
        stream.add_at(
            "old sighting",
            5,
            MemoryKind::Observation,
            now - Duration::seconds(600),
        );
        stream.add_at("new sighting", 5, MemoryKind::Observation, now);
        let top = stream.retrieve_at("sighting", 1, now);
        assert_eq!(top[0].text, "new sighting");
    }

    #[test]
    fn retrieval_weighs_importance() {
        let now = Utc::now();
        let mut stream = MemoryStream::new();
        stream.add_at("minor detail", 1, MemoryKind::Observation, now);
        stream.add_at("crucial warning", 10, MemoryKind::Observation, now);
        let top = stream.retrieve_at("unrelated query", 1, now);
        assert_eq!(top[0].text, "crucial warning");
    }

    #[test]
    fn latest_of_kind_finds_newest() {
        let mut stream = MemoryStream::new();
        stream.add("old voice", 9, MemoryKind::InnerVoice);
        stream.add("observation", 5, MemoryKind::Observation);
        stream.add("new voice", 9, MemoryKind::InnerVoice);
        assert_eq!(
            stream.latest_of_kind(MemoryKind::InnerVoice).unwrap().text,
            "new voice"
        );
        assert!(stream.latest_of_kind(MemoryKind::Reflection).is_none());
    }
}
