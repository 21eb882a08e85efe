//! The `/ws` game stream.
//!
//! Each connection gets a fresh [`PlayerId`] (its stable vote
//! identity), an immediate `sync.full`, and then one ordered message
//! batch per tick. Inbound messages are parsed as [`ClientMessage`];
//! malformed payloads and unknown kinds are ignored without touching
//! any state. A connection that lags the broadcast buffer is closed --
//! slow spectators must never back-pressure the tick loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::{debug, warn};

use arena_core::vote::Vote;
use arena_types::{AgentId, ClientMessage, PlayerId, ServerMessage};

use crate::state::{AppState, Command, DEFAULT_THINKING_LIMIT};

/// Upgrade an HTTP request into the game stream.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_game(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Serialize and send one protocol message. Returns `false` when the
/// peer is gone.
async fn send(socket: &mut WebSocket, message: &ServerMessage) -> bool {
    let json = match serde_json::to_string(message) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to serialize server message");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let player_id = PlayerId::new();
    let mut rx = state.subscribe();
    let mut followed: Option<AgentId> = None;

    debug!(%player_id, "Subscriber connected");

    // Full state first, so the client renders before the next tick.
    let full = state.snapshot.read().await.clone();
    if !send(&mut socket, &ServerMessage::SyncFull(full)).await {
        return;
    }

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Ok(frame) => {
                        for message in &frame.messages {
                            if !send(&mut socket, message).await {
                                debug!(%player_id, "Subscriber disconnected (send failed)");
                                return;
                            }
                        }
                        if let Some(agent_id) = followed
                            && let Some(agent) =
                                frame.updated.iter().find(|a| a.id == agent_id)
                        {
                            let detail = ServerMessage::AgentDetailMsg {
                                tick: frame.tick,
                                agent: agent.clone(),
                            };
                            if !send(&mut socket, &detail).await {
                                return;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // Too slow to keep tick order intact: cut the
                        // connection; the client resyncs on reconnect.
                        warn!(%player_id, skipped, "Subscriber lagged, disconnecting");
                        return;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed, shutting down socket");
                        return;
                    }
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => {
                                handle_client_message(
                                    &mut socket,
                                    &state,
                                    player_id,
                                    &mut followed,
                                    message,
                                )
                                .await;
                            }
                            Err(e) => {
                                // Protocol errors never mutate state.
                                debug!(%player_id, error = %e, "Ignoring malformed message");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%player_id, "Subscriber disconnected");
                        return;
                    }
                    Some(Err(e)) => {
                        debug!(%player_id, error = %e, "WebSocket error");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

async fn handle_client_message(
    socket: &mut WebSocket,
    state: &AppState,
    player_id: PlayerId,
    followed: &mut Option<AgentId>,
    message: ClientMessage,
) {
    match message {
        ClientMessage::VoteSubmit { agent_id, action } => {
            let vote = Vote {
                agent_id,
                action,
                player_id,
            };
            // try_send keeps the socket task from blocking on a busy
            // engine; an overflowing queue just drops the vote.
            if let Err(e) = state.commands.try_send(Command::Vote(vote)) {
                warn!(%player_id, error = %e, "Vote queue full, dropping vote");
            }
        }
        ClientMessage::AgentInspect { agent_id } => {
            reply_with_detail(socket, state, agent_id).await;
        }
        ClientMessage::AgentFollow { agent_id } => {
            *followed = agent_id;
            if let Some(agent_id) = agent_id {
                reply_with_detail(socket, state, agent_id).await;
            }
        }
        ClientMessage::ThinkingRequest { agent_id, limit } => {
            let entries = state.thinking.history(
                state.session,
                agent_id,
                limit.unwrap_or(DEFAULT_THINKING_LIMIT),
            );
            send(
                socket,
                &ServerMessage::ThinkingHistory { agent_id, entries },
            )
            .await;
        }
    }
}

/// Answer an inspect/follow with the agent's current full state.
/// Unknown agent ids are ignored.
async fn reply_with_detail(socket: &mut WebSocket, state: &AppState, agent_id: AgentId) {
    let snapshot = state.snapshot.read().await;
    let Some(agent) = snapshot.agents.iter().find(|a| a.id == agent_id) else {
        debug!(%agent_id, "Inspect for unknown agent ignored");
        return;
    };
    let message = ServerMessage::AgentDetailMsg {
        tick: snapshot.world.tick,
        agent: agent.clone(),
    };
    drop(snapshot);
    send(socket, &message).await;
}
