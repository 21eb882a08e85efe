//! Publisher for arena spectators.
//!
//! An Axum server exposing:
//!
//! - **`/ws`** -- the bidirectional game stream. Outbound: per-tick
//!   frames (world, agents, events, votes, paths) plus follow/inspect
//!   replies. Inbound: vote submissions, inspect/follow requests, and
//!   thinking-history queries.
//! - **REST endpoints** for one-shot snapshot reads (`/api/world`,
//!   `/api/agents`, `/api/events`, `/api/map`).
//! - **`GET /`** -- a minimal HTML status page.
//!
//! The publisher never mutates world state: REST reads come from the
//! per-tick snapshot, vote submissions are tagged with the connection's
//! player id and queued for the engine to drain before the next tick,
//! and a subscriber that cannot keep up with the broadcast stream is
//! disconnected (it resyncs via `sync.full` on reconnect).

pub mod error;
pub mod frame;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use frame::TickFrame;
pub use router::build_router;
pub use server::{spawn_observer, ServerError};
pub use state::{AppState, Command};
