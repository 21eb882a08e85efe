//! Shared application state for the publisher.
//!
//! [`AppState`] carries the broadcast channel for tick frames, the
//! latest full snapshot served to new connections and REST readers,
//! the command queue back to the engine, and the thinking-store
//! handle. The world itself is never reachable from here.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};

use arena_core::vote::Vote;
use arena_core::SharedThinkingStore;
use arena_types::{FullSync, SessionId};

use crate::frame::TickFrame;

/// Frames buffered per subscriber before it is considered too slow.
///
/// A subscriber that lags past this many frames is disconnected and
/// resyncs via `sync.full` on reconnect.
pub const BROADCAST_CAPACITY: usize = 256;

/// Inbound intents buffered for the engine.
pub const COMMAND_CAPACITY: usize = 256;

/// Default number of thinking-history entries returned when a request
/// does not name a limit.
pub const DEFAULT_THINKING_LIMIT: usize = 10;

/// Subscriber intents drained by the engine before each tick.
#[derive(Debug)]
pub enum Command {
    /// A spectator vote, already tagged with the connection's player id.
    Vote(Vote),
}

/// Shared state for the Axum application.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast sender for per-tick frames.
    pub tx: broadcast::Sender<Arc<TickFrame>>,
    /// The latest full snapshot (updated each tick by the engine).
    pub snapshot: Arc<RwLock<FullSync>>,
    /// Queue of inbound intents toward the engine.
    pub commands: mpsc::Sender<Command>,
    /// Reasoning-history reads for `thinking.request`.
    pub thinking: SharedThinkingStore,
    /// The world's session id, scoping thinking-history lookups.
    pub session: SessionId,
}

impl AppState {
    /// Build the state with an initial snapshot. Returns the state and
    /// the receiving end of the command queue for the engine to drain.
    pub fn new(
        initial: FullSync,
        thinking: SharedThinkingStore,
        session: SessionId,
    ) -> (Self, mpsc::Receiver<Command>) {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        (
            Self {
                tx,
                snapshot: Arc::new(RwLock::new(initial)),
                commands,
                thinking,
                session,
            },
            command_rx,
        )
    }

    /// Subscribe to the frame stream.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TickFrame>> {
        self.tx.subscribe()
    }

    /// Publish a frame to all connected subscribers. Returns the
    /// receiver count; zero simply means nobody is watching.
    pub fn broadcast(&self, frame: TickFrame) -> usize {
        self.tx.send(Arc::new(frame)).unwrap_or(0)
    }

    /// Replace the snapshot served to new connections and REST reads.
    pub async fn update_snapshot(&self, snapshot: FullSync) {
        *self.snapshot.write().await = snapshot;
    }
}
