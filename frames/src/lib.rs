//! Shared message model for the realtime WS transport.
//!
//! This crate owns the wire representation used by both `server` and
//! `client`. Two logical channels are multiplexed over one connection —
//! document updates and ephemeral presence — as self-describing JSON text
//! messages with a `type` tag.

use replica::{ReplicaState, Transaction};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error returned by [`decode_message`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text could not be decoded as a known message.
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Ephemeral per-connection presence state: pointer position and display
/// name. Never persisted; removed proactively when the connection closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub x: f64,
    pub y: f64,
    pub name: String,
}

/// A single message on the realtime wire protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Server → client on connect: the session id the relay assigned.
    Welcome { session_id: Uuid },
    /// Server → client on connect: full current document state.
    SyncDoc { state: ReplicaState },
    /// Document mutations, both directions. The relay merges inbound
    /// transactions and echoes them to every other connection.
    Update { tx: Transaction },
    /// Throttled pointer state. Clients send `session_id: None`; the relay
    /// stamps the sender's session before rebroadcast.
    Presence {
        session_id: Option<Uuid>,
        x: f64,
        y: f64,
        name: String,
    },
    /// A peer disconnected; drop its presence entry.
    PresenceLeave { session_id: Uuid },
}

impl Message {
    /// Build the broadcast form of a presence update for `session_id`.
    #[must_use]
    pub fn presence_from(session_id: Uuid, entry: &PresenceEntry) -> Self {
        Message::Presence {
            session_id: Some(session_id),
            x: entry.x,
            y: entry.y,
            name: entry.name.clone(),
        }
    }
}

/// Encode a message as a JSON text frame.
#[must_use]
pub fn encode_message(message: &Message) -> String {
    // Serializing these types to a String cannot fail: no non-string map
    // keys, no non-finite floats are produced by the protocol structs.
    serde_json::to_string(message).unwrap_or_default()
}

/// Decode a JSON text frame into a message.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] for malformed or unknown messages.
pub fn decode_message(text: &str) -> Result<Message, CodecError> {
    Ok(serde_json::from_str(text)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
