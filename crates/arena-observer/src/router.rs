//! Axum router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router: status page, game stream, REST API.
///
/// `allowed_origins` restricts CORS; an empty list allows any origin
/// (development default).
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(parse_origins(allowed_origins))
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handlers::index))
        .route("/ws", get(ws::ws_game))
        .route("/api/world", get(handlers::get_world))
        .route("/api/agents", get(handlers::list_agents))
        .route("/api/agents/{id}", get(handlers::get_agent))
        .route("/api/events", get(handlers::list_events))
        .route("/api/map", get(handlers::get_map))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_origins(origins: &[String]) -> AllowOrigin {
    if origins.is_empty() {
        return AllowOrigin::any();
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin, error = %e, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(values)
}
