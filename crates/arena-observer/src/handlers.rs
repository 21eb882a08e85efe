//! REST endpoint handlers.
//!
//! All reads come from the per-tick [`FullSync`] snapshot in
//! [`AppState`]; no handler can reach the world.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/world` | World header (tick, phase, zone) |
//! | `GET` | `/api/agents` | List agents (`?status=alive\|dead\|all`) |
//! | `GET` | `/api/agents/{id}` | Single agent, full form |
//! | `GET` | `/api/events` | Recent events (`?limit=N`) |
//! | `GET` | `/api/map` | Tile map in the binary `.map` format |
//!
//! [`FullSync`]: arena_types::FullSync

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::Json;

use arena_types::{AgentDetail, AgentId, GameEvent, WorldStateView};

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters for `GET /api/agents`.
#[derive(Debug, serde::Deserialize)]
pub struct AgentsQuery {
    /// `alive`, `dead`, or `all` (default).
    pub status: Option<String>,
}

/// Query parameters for `GET /api/events`.
#[derive(Debug, serde::Deserialize)]
pub struct EventsQuery {
    /// Maximum number of events to return.
    pub limit: Option<usize>,
}

/// Serve a minimal HTML page showing server status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let tick = snapshot.world.tick;
    let phase = format!("{:?}", snapshot.world.phase);
    let alive = snapshot.world.alive_count;
    let border = snapshot.world.shrink_border;
    let event_count = snapshot.events.len();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Arena Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #f85149; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #f85149; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        a:hover {{ text-decoration: underline; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
        hr {{ border: none; border-top: 1px solid #30363d; margin: 1.5rem 0; }}
    </style>
</head>
<body>
    <h1>Arena Observer</h1>
    <p class="subtitle">Battle-royale spectator server</p>

    <div>
        <div class="metric">
            <div class="label">Tick</div>
            <div class="value">{tick}</div>
        </div>
        <div class="metric">
            <div class="label">Phase</div>
            <div class="value">{phase}</div>
        </div>
        <div class="metric">
            <div class="label">Alive</div>
            <div class="value">{alive}</div>
        </div>
        <div class="metric">
            <div class="label">Zone</div>
            <div class="value">{border}</div>
        </div>
        <div class="metric">
            <div class="label">Events</div>
            <div class="value">{event_count}</div>
        </div>
    </div>

    <hr>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/world">/api/world</a> -- World header</li>
        <li><a href="/api/agents">/api/agents</a> -- List agents (?status=alive|dead|all)</li>
        <li><a href="/api/agents/0">/api/agents/{{id}}</a> -- Single agent detail</li>
        <li><a href="/api/events">/api/events</a> -- Recent events (?limit=N)</li>
        <li><a href="/api/map">/api/map</a> -- Binary tile map</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws</code> -- Live game stream</li>
    </ul>
</body>
</html>"#
    ))
}

/// `GET /api/world` -- the current world header.
pub async fn get_world(State(state): State<Arc<AppState>>) -> Json<WorldStateView> {
    Json(state.snapshot.read().await.world)
}

/// `GET /api/agents` -- list agents, optionally filtered by status.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgentsQuery>,
) -> Result<Json<Vec<AgentDetail>>, ObserverError> {
    let snapshot = state.snapshot.read().await;
    let agents: Vec<AgentDetail> = match query.status.as_deref() {
        Some("alive") => snapshot.agents.iter().filter(|a| a.alive).cloned().collect(),
        Some("dead") => snapshot.agents.iter().filter(|a| !a.alive).cloned().collect(),
        Some("all") | None => snapshot.agents.clone(),
        Some(other) => {
            return Err(ObserverError::InvalidQuery(format!(
                "unknown status filter: {other}"
            )))
        }
    };
    Ok(Json(agents))
}

/// `GET /api/agents/{id}` -- one agent, full form.
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> Result<Json<AgentDetail>, ObserverError> {
    let snapshot = state.snapshot.read().await;
    snapshot
        .agents
        .iter()
        .find(|a| a.id == AgentId(id))
        .cloned()
        .map(Json)
        .ok_or_else(|| ObserverError::NotFound(format!("agent {id}")))
}

/// `GET /api/events` -- the recent event window, newest last.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<GameEvent>> {
    let snapshot = state.snapshot.read().await;
    let events = &snapshot.events;
    let limit = query.limit.unwrap_or(events.len());
    let start = events.len().saturating_sub(limit);
    Json(events[start..].to_vec())
}

/// `GET /api/map` -- the tile map in its binary `.map` layout.
pub async fn get_map(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = state.snapshot.read().await;
    let wire = &snapshot.tile_map;

    let mut bytes = Vec::with_capacity(8 + wire.cells.len());
    bytes.extend_from_slice(&wire.width.to_le_bytes());
    bytes.extend_from_slice(&wire.height.to_le_bytes());
    bytes.extend_from_slice(&wire.cells);

    ([(header::CONTENT_TYPE, "application/octet-stream")], bytes)
}
