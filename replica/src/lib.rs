//! Replicated document model for `SyncSpace`.
//!
//! One replicated structure: a map from shape id to shape record with
//! per-key last-writer-wins merge. Every write carries a `(counter, writer)`
//! tag; the total order over tags decides concurrent conflicts, so any two
//! replicas that have seen the same set of transactions converge to the same
//! map contents regardless of delivery order.
//!
//! The relay holds the authoritative `Replica` per document; each client
//! holds its own and applies local edits optimistically. Neither side needs
//! coordination beyond exchanging `Transaction` payloads.

pub mod doc;
pub mod op;

pub use doc::{Replica, ReplicaState, SnapshotError};
pub use op::{ChangeKind, DocEvent, KeyChange, Op, Tag, Transaction, TxBuilder};
