//! Operations, transactions, and change summaries.
//!
//! DESIGN
//! ======
//! An `Op` is one tagged write: a value to install under a key, or a
//! tombstone (`value: None`) for a delete. A `Transaction` groups the ops of
//! one user action so peers apply, broadcast, and undo them as a unit.
//! `DocEvent` is what observers see: one entry per changed key with the
//! resulting and previous visible values, fired once per transaction.

#[cfg(test)]
#[path = "op_test.rs"]
mod op_test;

use canvas::{Shape, ShapeError, ShapeId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Causal tag on every write. Tags are totally ordered: counter first,
/// writer id as the deterministic tiebreak between concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tag {
    pub counter: u64,
    pub writer: Uuid,
}

/// One tagged write to a single key. `value: None` is a delete tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub id: ShapeId,
    pub tag: Tag,
    pub value: Option<Shape>,
}

/// The ops of one user action, applied and broadcast atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub ops: Vec<Op>,
}

impl Transaction {
    /// Largest op counter in this transaction, used to advance the
    /// receiving replica's clock.
    #[must_use]
    pub fn max_counter(&self) -> u64 {
        self.ops.iter().map(|op| op.tag.counter).max().unwrap_or(0)
    }
}

/// How a key changed within one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// One key's change within a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyChange {
    pub id: ShapeId,
    pub kind: ChangeKind,
    /// Visible value after the transaction (`None` for deletes).
    pub value: Option<Shape>,
    /// Visible value before the transaction (`None` if the key was absent).
    pub prev: Option<Shape>,
}

/// Per-transaction change summary delivered to observers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocEvent {
    pub changes: Vec<KeyChange>,
}

impl DocEvent {
    /// True when the transaction had no visible effect.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Collects the set/delete calls made inside [`crate::Replica::transact`].
///
/// Tags are assigned at commit time, in call order.
#[derive(Debug, Default)]
pub struct TxBuilder {
    pub(crate) ops: Vec<(ShapeId, Option<Shape>)>,
}

impl TxBuilder {
    /// Stage a set. The record is validated here; a malformed record stages
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns the validation failure without touching the transaction.
    pub fn set(&mut self, shape: Shape) -> Result<(), ShapeError> {
        shape.validate()?;
        self.ops.push((shape.id.clone(), Some(shape)));
        Ok(())
    }

    /// Stage a delete tombstone for `id`.
    pub fn delete(&mut self, id: impl Into<ShapeId>) {
        self.ops.push((id.into(), None));
    }

    /// Number of staged ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing has been staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
