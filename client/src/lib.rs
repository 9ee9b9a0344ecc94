//! Client-side reconciliation for `SyncSpace`.
//!
//! Everything the UI layer needs to talk to a whiteboard document: a
//! `Reconciler` owning the local replica, a render snapshot kept current by
//! the replica's observer, throttled presence and stroke streams, a remote
//! pointer view, and a bounded undo/redo journal over local edits. The
//! transport is out of scope here: the reconciler consumes decoded inbound
//! frames and queues outbound ones.

pub mod presence;
pub mod reconciler;
pub mod throttle;
pub mod undo;
pub mod util;

pub use presence::{Peer, PresenceView};
pub use reconciler::{ReconcileError, Reconciler, RenderSnapshot, Role, SubscriptionId};
pub use throttle::Throttle;
pub use undo::{Delta, Journal};
