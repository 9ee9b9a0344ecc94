//! Undo/redo journal over document transactions.
//!
//! DESIGN
//! ======
//! Each undoable step is stored as a `Delta`: the per-key values to restore
//! (`None` restores an absence, i.e. deletes). Applying a delta naturally
//! yields its own inverse by reading the current values first, so undo and
//! redo are the same operation with the stacks swapped.
//!
//! Only local edits are recorded; remote merges must never end up on the
//! local undo stack. The journal is bounded, dropping the oldest step when
//! full.

#[cfg(test)]
#[path = "undo_test.rs"]
mod tests;

use std::collections::VecDeque;

use canvas::{Shape, ShapeId};

/// Depth of the undo stack.
pub const JOURNAL_CAPACITY: usize = 100;

/// The values to restore to walk one step back (or forward).
#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub restores: Vec<(ShapeId, Option<Shape>)>,
}

#[derive(Debug, Default)]
pub struct Journal {
    undo: VecDeque<Delta>,
    redo: Vec<Delta>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inverse of a fresh local edit. Any redo history is now
    /// unreachable and is discarded.
    pub fn record(&mut self, delta: Delta) {
        if delta.restores.is_empty() {
            return;
        }
        if self.undo.len() == JOURNAL_CAPACITY {
            self.undo.pop_front();
        }
        self.undo.push_back(delta);
        self.redo.clear();
    }

    pub fn take_undo(&mut self) -> Option<Delta> {
        self.undo.pop_back()
    }

    pub fn take_redo(&mut self) -> Option<Delta> {
        self.redo.pop()
    }

    /// Push the inverse produced by applying a redo delta. Unlike
    /// [`Journal::record`] this keeps the remaining redo history.
    pub fn restore_undo(&mut self, delta: Delta) {
        if self.undo.len() == JOURNAL_CAPACITY {
            self.undo.pop_front();
        }
        self.undo.push_back(delta);
    }

    pub fn push_redo(&mut self, delta: Delta) {
        self.redo.push(delta);
    }

    #[must_use]
    pub fn undo_depth(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_depth(&self) -> usize {
        self.redo.len()
    }
}
