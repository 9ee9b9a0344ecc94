//! Remote pointer view.
//!
//! DESIGN
//! ======
//! A flat session-id → pointer map, last write wins per session. The relay
//! stamps every relayed presence frame with its origin session, so an
//! unstamped frame here means a protocol violation and is dropped.

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;

use std::collections::HashMap;

use frames::Message;
use tracing::warn;
use uuid::Uuid;

use crate::util::user_color;

/// One remote pointer as the rendering layer draws it.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub x: f64,
    pub y: f64,
    pub name: String,
    pub color: &'static str,
}

#[derive(Debug, Default)]
pub struct PresenceView {
    peers: HashMap<Uuid, Peer>,
}

impl PresenceView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a relayed presence frame into the view. Non-presence frames are
    /// ignored.
    pub fn apply(&mut self, message: &Message) {
        match message {
            Message::Presence { session_id: Some(session_id), x, y, name } => {
                let peer = Peer {
                    x: *x,
                    y: *y,
                    name: name.clone(),
                    color: user_color(*session_id),
                };
                self.peers.insert(*session_id, peer);
            }
            Message::Presence { session_id: None, .. } => {
                warn!("presence frame without origin session; dropped");
            }
            Message::PresenceLeave { session_id } => {
                self.peers.remove(session_id);
            }
            _ => {}
        }
    }

    #[must_use]
    pub fn peers(&self) -> &HashMap<Uuid, Peer> {
        &self.peers
    }
}
