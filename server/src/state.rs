//! Shared relay state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the snapshot store and the registry of live documents: one
//! authoritative replica, connected clients, and presence map per document
//! name. Documents are created on first access and kept warm when the last
//! client leaves; only a debounced snapshot write makes them durable.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use frames::{Message, PresenceEntry};
use replica::Replica;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::store::SnapshotStore;

// =============================================================================
// DOCUMENT STATE
// =============================================================================

/// Per-document live state. The replica here is the authoritative copy.
pub struct DocState {
    /// Authoritative replicated document.
    pub replica: Replica,
    /// Connected clients: session id -> sender for outgoing messages.
    pub clients: HashMap<Uuid, mpsc::Sender<Message>>,
    /// Ephemeral presence entries keyed by session id.
    pub presence: HashMap<Uuid, PresenceEntry>,
    /// True when the replica has mutations not yet persisted.
    pub dirty: bool,
    /// Bumped on every mutation; a debounce task only saves if the
    /// generation it captured is still current when its timer fires.
    pub save_generation: u64,
}

impl DocState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            replica: Replica::new(Uuid::new_v4()),
            clients: HashMap::new(),
            presence: HashMap::new(),
            dirty: false,
            save_generation: 0,
        }
    }
}

impl Default for DocState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared relay state, injected into Axum handlers via the State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    /// Live documents keyed by document name.
    pub docs: Arc<RwLock<HashMap<String, DocState>>>,
    /// Durable snapshot storage.
    pub store: Arc<SnapshotStore>,
    /// Quiet period before a dirty document is written out.
    pub save_debounce: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(store: SnapshotStore, save_debounce: Duration) -> Self {
        Self {
            docs: Arc::new(RwLock::new(HashMap::new())),
            store: Arc::new(store),
            save_debounce,
        }
    }
}
