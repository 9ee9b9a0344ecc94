//! WebSocket handler — per-connection relay loop.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade on `/ws/{doc}` → join the document (hydrating it from its
//!    snapshot on first access) → send `welcome`, `sync_doc`, and the
//!    presence entries of every other live session.
//! 2. `select!` loop: inbound client messages are dispatched; broadcast
//!    messages from peers are forwarded out.
//! 3. Close → remove presence, tell peers, deregister. The document's
//!    replica stays warm.
//!
//! ERROR HANDLING
//! ==============
//! A message that fails to decode is logged and dropped; the connection
//! stays open. Unexpected-but-valid message kinds from clients are ignored
//! the same way.

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use frames::{Message, PresenceEntry, decode_message, encode_message};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::services;
use crate::state::AppState;

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(doc): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state, doc))
}

async fn run_ws(mut socket: WebSocket, state: AppState, doc_name: String) {
    let session_id = Uuid::new_v4();

    // Per-connection channel for broadcast messages from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Message>(256);

    let (doc_state, peers) = services::doc::join(&state, &doc_name, session_id, client_tx).await;

    // Initial sync: identity, full document state, then live peer presence.
    if send_message(&mut socket, &Message::Welcome { session_id }).await.is_err() {
        services::doc::leave(&state, &doc_name, session_id).await;
        return;
    }
    let synced = send_message(&mut socket, &Message::SyncDoc { state: doc_state }).await;
    if synced.is_err() {
        services::doc::leave(&state, &doc_name, session_id).await;
        return;
    }
    for (peer_id, entry) in &peers {
        if send_message(&mut socket, &Message::presence_from(*peer_id, entry)).await.is_err() {
            break;
        }
    }

    info!(doc = %doc_name, %session_id, "ws: session connected");

    loop {
        tokio::select! {
            inbound = socket.recv() => {
                let Some(Ok(inbound)) = inbound else { break };
                match inbound {
                    WsMessage::Text(text) => {
                        dispatch(&state, &doc_name, session_id, text.as_str()).await;
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            Some(outbound) = client_rx.recv() => {
                if send_message(&mut socket, &outbound).await.is_err() {
                    break;
                }
            }
        }
    }

    // Cleanup: peers must see the presence entry vanish promptly.
    let had_presence = services::doc::leave(&state, &doc_name, session_id).await;
    if had_presence {
        let gone = Message::PresenceLeave { session_id };
        services::doc::broadcast(&state, &doc_name, &gone, Some(session_id)).await;
    }
    info!(doc = %doc_name, %session_id, "ws: session disconnected");
}

/// Decode and apply one inbound text frame.
async fn dispatch(state: &AppState, doc_name: &str, session_id: Uuid, text: &str) {
    let message = match decode_message(text) {
        Ok(message) => message,
        Err(e) => {
            warn!(doc = %doc_name, %session_id, error = %e, "ws: invalid inbound message");
            return;
        }
    };

    match message {
        Message::Update { tx } => {
            if services::doc::merge_update(state, doc_name, &tx).await {
                let echo = Message::Update { tx };
                services::doc::broadcast(state, doc_name, &echo, Some(session_id)).await;
                services::persistence::schedule_save(state, doc_name).await;
            }
        }
        Message::Presence { x, y, name, .. } => {
            let entry = PresenceEntry { x, y, name };
            services::doc::update_presence(state, doc_name, session_id, entry.clone()).await;
            let stamped = Message::presence_from(session_id, &entry);
            services::doc::broadcast(state, doc_name, &stamped, Some(session_id)).await;
        }
        Message::Welcome { .. } | Message::SyncDoc { .. } | Message::PresenceLeave { .. } => {
            warn!(doc = %doc_name, %session_id, "ws: unexpected server-only message from client");
        }
    }
}

async fn send_message(socket: &mut WebSocket, message: &Message) -> Result<(), ()> {
    let text = encode_message(message);
    socket.send(WsMessage::Text(text.into())).await.map_err(|_| ())
}
