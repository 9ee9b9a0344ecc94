//! Document service — join/leave, authoritative merge, and broadcast.
//!
//! DESIGN
//! ======
//! A document's lifecycle is `absent → loading → active`: the first join for
//! a name reads the persisted snapshot (or starts empty) and installs the
//! in-memory state; later joins reuse it. When the last client leaves, the
//! replica stays warm — eviction would only trade memory for a reload, and
//! a durable snapshot always exists once the debounce fires.
//!
//! All mutation of a document's replica and presence map happens behind the
//! registry's `RwLock`; handlers never hold the lock across a send.

#[cfg(test)]
#[path = "doc_test.rs"]
mod tests;

use frames::{Message, PresenceEntry};
use replica::{ReplicaState, Transaction};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, DocState};

/// Register a connection with a document, hydrating the document from its
/// persisted snapshot on first access.
///
/// Returns the full document state for initial sync and the presence
/// entries of all other connected sessions.
pub async fn join(
    state: &AppState,
    name: &str,
    session_id: Uuid,
    sender: mpsc::Sender<Message>,
) -> (ReplicaState, Vec<(Uuid, PresenceEntry)>) {
    // Load outside the lock; a concurrent first join may race us, in which
    // case the loser's bytes are simply dropped.
    let loaded = if state.docs.read().await.contains_key(name) {
        None
    } else {
        load_snapshot(state, name).await
    };

    let mut docs = state.docs.write().await;
    let doc = docs.entry(name.to_string()).or_insert_with(|| {
        let mut doc = DocState::new();
        if let Some(snapshot) = loaded {
            doc.replica.apply_state(&snapshot);
        }
        doc
    });

    doc.clients.insert(session_id, sender);
    info!(doc = name, %session_id, clients = doc.clients.len(), "session joined");

    let peers = doc
        .presence
        .iter()
        .filter(|(id, _)| **id != session_id)
        .map(|(id, entry)| (*id, entry.clone()))
        .collect();
    (doc.replica.state(), peers)
}

async fn load_snapshot(state: &AppState, name: &str) -> Option<ReplicaState> {
    match state.store.load(name).await {
        Ok(Some(bytes)) => match ReplicaState::decode(&bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                // Corrupt snapshot: fall back to an empty document rather
                // than refusing the connection.
                warn!(doc = name, error = %e, "snapshot decode failed, starting empty");
                None
            }
        },
        Ok(None) => {
            info!(doc = name, "new document");
            None
        }
        Err(e) => {
            warn!(doc = name, error = %e, "snapshot load failed, starting empty");
            None
        }
    }
}

/// Remove a connection from a document. Returns `true` if the session had a
/// presence entry that peers must be told to drop.
pub async fn leave(state: &AppState, name: &str, session_id: Uuid) -> bool {
    let mut docs = state.docs.write().await;
    let Some(doc) = docs.get_mut(name) else {
        return false;
    };
    doc.clients.remove(&session_id);
    let had_presence = doc.presence.remove(&session_id).is_some();
    info!(doc = name, %session_id, clients = doc.clients.len(), "session left");
    // The replica stays in memory even with zero clients.
    had_presence
}

/// Merge an inbound transaction into the authoritative replica.
///
/// Returns `true` when the merge had a visible effect (the transaction
/// should be rebroadcast and the document marked dirty).
pub async fn merge_update(state: &AppState, name: &str, tx: &Transaction) -> bool {
    let mut docs = state.docs.write().await;
    let Some(doc) = docs.get_mut(name) else {
        return false;
    };
    let event = doc.replica.apply(tx);
    if event.is_empty() {
        return false;
    }
    doc.dirty = true;
    true
}

/// Record a connection's latest presence state (last write wins).
pub async fn update_presence(state: &AppState, name: &str, session_id: Uuid, entry: PresenceEntry) {
    let mut docs = state.docs.write().await;
    if let Some(doc) = docs.get_mut(name) {
        doc.presence.insert(session_id, entry);
    }
}

/// Send a message to every connection on a document, optionally excluding
/// one session (the originator never hears its own update echoed back).
pub async fn broadcast(state: &AppState, name: &str, message: &Message, exclude: Option<Uuid>) {
    let senders: Vec<(Uuid, mpsc::Sender<Message>)> = {
        let docs = state.docs.read().await;
        let Some(doc) = docs.get(name) else {
            return;
        };
        doc.clients
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    };

    let sends = senders.iter().map(|(session_id, sender)| {
        let message = message.clone();
        async move {
            if sender.send(message).await.is_err() {
                // Receiver side already closed; its socket task cleans up.
                warn!(%session_id, "dropped broadcast to closed session");
            }
        }
    });
    futures::future::join_all(sends).await;
}
