//! The replica itself: entries, merge, observers, and snapshots.
//!
//! DESIGN
//! ======
//! `Replica` stores one `Entry { tag, value }` per key; `value: None` is a
//! tombstone kept so a concurrent set and delete of the same key resolve the
//! same way everywhere. Local writes always win locally (their tags are
//! fresh maxima of the local clock); remote ops are installed only when
//! their tag exceeds the stored one, which makes re-delivery a no-op.
//!
//! Snapshots serialize the full entry map including tombstones and tags, so
//! restoring a snapshot is itself a merge: a client joining with local
//! offline edits keeps whichever writes win per key.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::HashMap;

use canvas::{Shape, ShapeError, ShapeId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::op::{ChangeKind, DocEvent, KeyChange, Op, Tag, Transaction, TxBuilder};

/// One stored entry. Tombstones (`value: None`) persist so deletes merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub tag: Tag,
    pub value: Option<Shape>,
}

/// Full serializable replica state, used for persistence snapshots and
/// initial sync payloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplicaState {
    pub entries: HashMap<ShapeId, Entry>,
}

/// Snapshot encode/decode failure.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ReplicaState {
    /// Decode a snapshot blob.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Decode`] for malformed bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, SnapshotError> {
        serde_json::from_slice(bytes).map_err(SnapshotError::Decode)
    }

    /// Encode this state as an opaque snapshot blob.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, SnapshotError> {
        serde_json::to_vec(self).map_err(SnapshotError::Encode)
    }
}

/// Observer registration handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

type ObserverFn = Box<dyn FnMut(&DocEvent) + Send + Sync>;

/// One copy of a replicated document.
pub struct Replica {
    writer: Uuid,
    counter: u64,
    entries: HashMap<ShapeId, Entry>,
    observers: Vec<(ObserverId, ObserverFn)>,
    next_observer: u64,
}

impl Replica {
    /// Create an empty replica owned by `writer`.
    #[must_use]
    pub fn new(writer: Uuid) -> Self {
        Self {
            writer,
            counter: 0,
            entries: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// The writer id stamped on this replica's local mutations.
    #[must_use]
    pub fn writer(&self) -> Uuid {
        self.writer
    }

    /// Visible value for `id` (absent keys and tombstones both read as `None`).
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Shape> {
        self.entries.get(id).and_then(|entry| entry.value.as_ref())
    }

    /// Ids of all visible shapes.
    pub fn keys(&self) -> impl Iterator<Item = &ShapeId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.value.is_some())
            .map(|(id, _)| id)
    }

    /// All visible shapes.
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.entries.values().filter_map(|entry| entry.value.as_ref())
    }

    /// Number of visible shapes (tombstones excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().filter(|entry| entry.value.is_some()).count()
    }

    /// True when no shape is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register an observer invoked once per applied transaction.
    pub fn observe(&mut self, callback: ObserverFn) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, callback));
        id
    }

    /// Remove a previously registered observer.
    pub fn unobserve(&mut self, id: ObserverId) {
        self.observers.retain(|(observer_id, _)| *observer_id != id);
    }

    /// Set a single record as its own transaction.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; the document is left untouched.
    pub fn set(&mut self, shape: Shape) -> Result<Transaction, ShapeError> {
        shape.validate()?;
        let tx = self.transact(|tx| {
            // Validated above; staging cannot fail.
            let _ = tx.set(shape);
        });
        Ok(tx.unwrap_or(Transaction { ops: Vec::new() }))
    }

    /// Delete a single key as its own transaction.
    pub fn delete(&mut self, id: impl Into<ShapeId>) -> Transaction {
        let id = id.into();
        self.transact(|tx| tx.delete(id))
            .unwrap_or(Transaction { ops: Vec::new() })
    }

    /// Run `f`, coalescing every staged set/delete into one causal unit and
    /// one outbound payload. Returns `None` when nothing was staged.
    pub fn transact(&mut self, f: impl FnOnce(&mut TxBuilder)) -> Option<Transaction> {
        let mut builder = TxBuilder::default();
        f(&mut builder);
        if builder.is_empty() {
            return None;
        }

        let mut ops = Vec::with_capacity(builder.ops.len());
        let mut changes: Vec<KeyChange> = Vec::new();
        for (id, value) in builder.ops {
            self.counter += 1;
            let tag = Tag { counter: self.counter, writer: self.writer };
            let op = Op { id, tag, value };
            self.install(&mut changes, op.clone());
            ops.push(op);
        }

        let event = DocEvent { changes };
        self.notify(&event);
        Some(Transaction { ops })
    }

    /// Merge a remote transaction. Idempotent: ops whose tag does not exceed
    /// the stored tag change nothing. Returns the visible changes.
    pub fn apply(&mut self, tx: &Transaction) -> DocEvent {
        self.counter = self.counter.max(tx.max_counter());

        let mut changes: Vec<KeyChange> = Vec::new();
        for op in &tx.ops {
            self.merge(&mut changes, op);
        }

        let event = DocEvent { changes };
        self.notify(&event);
        event
    }

    /// Merge a full state (initial sync or persisted snapshot) entry by
    /// entry under the same LWW rule. Returns the visible changes.
    pub fn apply_state(&mut self, state: &ReplicaState) -> DocEvent {
        let mut changes: Vec<KeyChange> = Vec::new();
        for (id, entry) in &state.entries {
            self.counter = self.counter.max(entry.tag.counter);
            self.merge(
                &mut changes,
                &Op { id: id.clone(), tag: entry.tag, value: entry.value.clone() },
            );
        }

        let event = DocEvent { changes };
        self.notify(&event);
        event
    }

    /// Clone the full entry map for persistence or initial sync.
    #[must_use]
    pub fn state(&self) -> ReplicaState {
        ReplicaState { entries: self.entries.clone() }
    }

    /// Encode the full state as an opaque snapshot blob.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Encode`] if serialization fails.
    pub fn snapshot(&self) -> Result<Vec<u8>, SnapshotError> {
        self.state().encode()
    }

    /// Unconditionally install a local op (its tag is a fresh local maximum).
    fn install(&mut self, changes: &mut Vec<KeyChange>, op: Op) {
        let prev = self
            .entries
            .insert(op.id.clone(), Entry { tag: op.tag, value: op.value.clone() })
            .and_then(|entry| entry.value);
        record_change(changes, op.id, prev, op.value);
    }

    /// Install a remote op only when its tag wins.
    fn merge(&mut self, changes: &mut Vec<KeyChange>, op: &Op) {
        let wins = self.entries.get(&op.id).is_none_or(|entry| op.tag > entry.tag);
        if !wins {
            return;
        }

        let prev = self
            .entries
            .insert(op.id.clone(), Entry { tag: op.tag, value: op.value.clone() })
            .and_then(|entry| entry.value);
        record_change(changes, op.id.clone(), prev, op.value.clone());
    }

    fn notify(&mut self, event: &DocEvent) {
        if event.is_empty() {
            return;
        }
        for (_, callback) in &mut self.observers {
            callback(event);
        }
    }
}

/// Fold a per-op change into the transaction summary: one entry per key,
/// keeping the earliest previous value and the latest resulting value.
fn record_change(changes: &mut Vec<KeyChange>, id: ShapeId, prev: Option<Shape>, value: Option<Shape>) {
    if let Some(pos) = changes.iter().position(|change| change.id == id) {
        let change = &mut changes[pos];
        change.value = value;
        change.kind = classify(change.prev.as_ref(), change.value.as_ref());
        // A key added then deleted within one transaction had no visible effect.
        if change.prev.is_none() && change.value.is_none() {
            changes.remove(pos);
        }
        return;
    }

    if prev.is_none() && value.is_none() {
        // Tombstone over an absent key: tag bookkeeping only.
        return;
    }
    let kind = classify(prev.as_ref(), value.as_ref());
    changes.push(KeyChange { id, kind, value, prev });
}

fn classify(prev: Option<&Shape>, value: Option<&Shape>) -> ChangeKind {
    match (prev, value) {
        (None, _) => ChangeKind::Added,
        (Some(_), Some(_)) => ChangeKind::Updated,
        (Some(_), None) => ChangeKind::Deleted,
    }
}
