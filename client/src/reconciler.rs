//! Local reconciler: the client-side owner of one replicated document.
//!
//! DESIGN
//! ======
//! The reconciler sits between the UI, the wire, and the replica:
//!
//! - Local edits go straight into the replica (optimistic) and the resulting
//!   transaction is queued outbound; `take_outbound` hands the queue to the
//!   transport.
//! - Inbound frames are folded in via `handle_message`; document updates
//!   merge through the replica, presence frames land in the peer view.
//! - The render snapshot is an `Arc<Mutex<..>>` map the rendering layer
//!   reads; a replica observer keeps it current and fires subscriber hooks
//!   once per transaction.
//!
//! Two streams are throttled at the event site rather than by a timer:
//! pointer presence and in-progress stroke writes. A stroke's points always
//! land in the render snapshot immediately; only the replica write (and so
//! the network) waits for the throttle. On completion the full point list is
//! simplified once and written in a single update.
//!
//! Undo records only local edits. Each entry is the set of per-key values to
//! restore; applying it reads the current values first, which is exactly the
//! redo entry.

#[cfg(test)]
#[path = "reconciler_test.rs"]
mod tests;

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use canvas::consts::{ARROW_NUDGE, MIN_SHAPE_SIZE, MIN_TEXT_WIDTH, SIMPLIFY_TOLERANCE};
use canvas::{Aabb, Shape, ShapeError, ShapeId, ShapeKind, marquee_select, simplify};
use frames::Message;
use replica::Replica;
use uuid::Uuid;

use crate::presence::{Peer, PresenceView};
use crate::throttle::{CURSOR_THROTTLE, STROKE_THROTTLE, Throttle};
use crate::undo::{Delta, Journal};
use crate::util::generate_display_name;

/// What the current user may do to this document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Owner,
    Editor,
    Viewer,
}

impl Role {
    #[must_use]
    pub fn can_edit(self) -> bool {
        !matches!(self, Self::Viewer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("viewers cannot modify the document")]
    ReadOnly,
    #[error("no such shape: {0}")]
    UnknownShape(ShapeId),
    #[error(transparent)]
    Shape(#[from] ShapeError),
}

/// The id → shape map the rendering layer draws from.
pub type RenderSnapshot = Arc<Mutex<HashMap<ShapeId, Shape>>>;

type SnapshotHook = Box<dyn FnMut() + Send>;

/// Handle returned by [`Reconciler::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub struct Reconciler {
    doc: Replica,
    snapshot: RenderSnapshot,
    hooks: Arc<Mutex<Vec<(SubscriptionId, SnapshotHook)>>>,
    next_hook: u64,
    journal: Journal,
    presence: PresenceView,
    outbound: VecDeque<Message>,
    session_id: Option<Uuid>,
    display_name: String,
    role: Role,
    cursor_throttle: Throttle,
    stroke_throttle: Throttle,
    draft: Option<Shape>,
}

impl Reconciler {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self::with_name(role, generate_display_name())
    }

    #[must_use]
    pub fn with_name(role: Role, display_name: String) -> Self {
        let snapshot = RenderSnapshot::default();
        let hooks: Arc<Mutex<Vec<(SubscriptionId, SnapshotHook)>>> = Arc::default();

        let mut doc = Replica::new(Uuid::new_v4());
        let observed = Arc::clone(&snapshot);
        let observed_hooks = Arc::clone(&hooks);
        doc.observe(Box::new(move |event| {
            {
                let mut map = observed.lock().expect("render snapshot lock poisoned");
                for change in &event.changes {
                    match &change.value {
                        Some(shape) => {
                            map.insert(change.id.clone(), shape.clone());
                        }
                        None => {
                            map.remove(&change.id);
                        }
                    }
                }
            }
            let mut hooks = observed_hooks.lock().expect("subscriber lock poisoned");
            for (_, hook) in hooks.iter_mut() {
                hook();
            }
        }));

        Self {
            doc,
            snapshot,
            hooks,
            next_hook: 0,
            journal: Journal::new(),
            presence: PresenceView::new(),
            outbound: VecDeque::new(),
            session_id: None,
            display_name,
            role,
            cursor_throttle: Throttle::new(CURSOR_THROTTLE),
            stroke_throttle: Throttle::new(STROKE_THROTTLE),
            draft: None,
        }
    }

    /// Override the default presence/stroke throttle intervals.
    #[must_use]
    pub fn with_throttles(mut self, cursor: Duration, stroke: Duration) -> Self {
        self.cursor_throttle = Throttle::new(cursor);
        self.stroke_throttle = Throttle::new(stroke);
        self
    }

    // =========================================================
    // Views
    // =========================================================

    /// Session id assigned by the relay's `welcome`, if connected.
    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Shared handle to the render snapshot.
    #[must_use]
    pub fn render_snapshot(&self) -> RenderSnapshot {
        Arc::clone(&self.snapshot)
    }

    /// Current merged value of one shape.
    #[must_use]
    pub fn shape(&self, id: &str) -> Option<Shape> {
        self.doc.get(id).cloned()
    }

    /// Remote pointers for rendering.
    #[must_use]
    pub fn peers(&self) -> &HashMap<Uuid, Peer> {
        self.presence.peers()
    }

    /// Ids of every shape whose bounding box overlaps `region`.
    #[must_use]
    pub fn select_in(&self, region: &Aabb) -> Vec<ShapeId> {
        marquee_select(region, self.doc.shapes())
    }

    /// Register a snapshot-changed hook, fired once per applied transaction.
    pub fn subscribe(&mut self, hook: impl FnMut() + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_hook);
        self.next_hook += 1;
        self.hooks
            .lock()
            .expect("subscriber lock poisoned")
            .push((id, Box::new(hook)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.hooks
            .lock()
            .expect("subscriber lock poisoned")
            .retain(|(hook_id, _)| *hook_id != id);
    }

    // =========================================================
    // Wire
    // =========================================================

    /// Drain the messages queued for the transport.
    pub fn take_outbound(&mut self) -> Vec<Message> {
        self.outbound.drain(..).collect()
    }

    /// Fold one inbound frame into local state.
    pub fn handle_message(&mut self, message: Message) {
        match message {
            Message::Welcome { session_id } => {
                self.session_id = Some(session_id);
            }
            Message::SyncDoc { state } => {
                self.doc.apply_state(&state);
            }
            Message::Update { tx } => {
                self.doc.apply(&tx);
            }
            presence @ (Message::Presence { .. } | Message::PresenceLeave { .. }) => {
                self.presence.apply(&presence);
            }
        }
    }

    /// Throttled presence emission; every call updates nothing locally, the
    /// relay stamps and fans the frame out to peers.
    pub fn pointer_moved(&mut self, x: f64, y: f64, now: Instant) {
        if self.cursor_throttle.ready(now) {
            self.outbound.push_back(Message::Presence {
                session_id: None,
                x,
                y,
                name: self.display_name.clone(),
            });
        }
    }

    // =========================================================
    // Edits
    // =========================================================

    /// Add a new shape to the document.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers; validation failures pass
    /// through without touching the document.
    pub fn create_shape(&mut self, shape: Shape) -> Result<(), ReconcileError> {
        self.write_shape(shape)
    }

    /// Replace an existing shape's record.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Reconciler::create_shape`].
    pub fn update_shape(&mut self, shape: Shape) -> Result<(), ReconcileError> {
        self.write_shape(shape)
    }

    /// Delete one shape.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers.
    pub fn delete_shape(&mut self, id: &str) -> Result<(), ReconcileError> {
        self.check_editable()?;
        let restores = vec![(id.to_owned(), self.doc.get(id).cloned())];
        let tx = self.doc.transact(|tx| tx.delete(id.to_owned()));
        self.finish_edit(restores, tx);
        Ok(())
    }

    /// Translate every selected shape by `(dx, dy)` as one undo step.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers.
    pub fn move_selection(&mut self, ids: &[ShapeId], dx: f64, dy: f64) -> Result<(), ReconcileError> {
        self.check_editable()?;
        let mut restores = Vec::new();
        let mut moved = Vec::new();
        for id in ids {
            let Some(shape) = self.doc.get(id) else { continue };
            restores.push((id.clone(), Some(shape.clone())));
            let mut shape = shape.clone();
            shape.x += dx;
            shape.y += dy;
            moved.push(shape);
        }
        let tx = self.doc.transact(move |tx| {
            for shape in moved {
                // Translation preserves validity.
                let _ = tx.set(shape);
            }
        });
        self.finish_edit(restores, tx);
        Ok(())
    }

    /// Arrow-key nudge: one 10px step per axis unit in `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers.
    pub fn nudge_selection(&mut self, ids: &[ShapeId], dx: f64, dy: f64) -> Result<(), ReconcileError> {
        self.move_selection(ids, dx * ARROW_NUDGE, dy * ARROW_NUDGE)
    }

    /// Delete every selected shape as one undo step.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers.
    pub fn delete_selection(&mut self, ids: &[ShapeId]) -> Result<(), ReconcileError> {
        self.check_editable()?;
        let mut restores = Vec::new();
        for id in ids {
            let Some(shape) = self.doc.get(id) else { continue };
            restores.push((id.clone(), Some(shape.clone())));
        }
        let staged: Vec<ShapeId> = restores.iter().map(|(id, _)| id.clone()).collect();
        let tx = self.doc.transact(move |tx| {
            for id in staged {
                tx.delete(id);
            }
        });
        self.finish_edit(restores, tx);
        Ok(())
    }

    /// Bake an interactive resize into the shape's dimensions and reset its
    /// scale factors to 1, clamping to the minimum sizes.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers, [`ReconcileError::UnknownShape`]
    /// when `id` is not in the document.
    pub fn commit_resize(&mut self, id: &str) -> Result<(), ReconcileError> {
        self.check_editable()?;
        let Some(shape) = self.doc.get(id) else {
            return Err(ReconcileError::UnknownShape(id.to_owned()));
        };
        let restores = vec![(shape.id.clone(), Some(shape.clone()))];

        let mut resized = shape.clone();
        let (sx, sy) = (resized.scale_x, resized.scale_y);
        match resized.kind {
            ShapeKind::Rectangle => {
                resized.width = resized.width.map(|w| (w * sx).max(MIN_SHAPE_SIZE));
                resized.height = resized.height.map(|h| (h * sy).max(MIN_SHAPE_SIZE));
            }
            ShapeKind::Ellipse => {
                resized.radius = resized.radius.map(|r| (r * sx.max(sy)).max(MIN_SHAPE_SIZE));
            }
            ShapeKind::Text => {
                resized.width = resized.width.map(|w| (w * sx).max(MIN_TEXT_WIDTH));
            }
            ShapeKind::Polyline => {
                if let Some(points) = &mut resized.points {
                    for (i, value) in points.iter_mut().enumerate() {
                        *value *= if i % 2 == 0 { sx } else { sy };
                    }
                }
            }
        }
        resized.scale_x = 1.0;
        resized.scale_y = 1.0;

        let tx = self.doc.transact(move |tx| {
            let _ = tx.set(resized);
        });
        self.finish_edit(restores, tx);
        Ok(())
    }

    // =========================================================
    // Freehand strokes
    // =========================================================

    /// Start a freehand stroke at `(x, y)`. The initial single-point record
    /// is written to the document at once; this is the stroke's undo step.
    ///
    /// # Errors
    ///
    /// [`ReconcileError::ReadOnly`] for viewers.
    pub fn begin_stroke(
        &mut self,
        id: impl Into<ShapeId>,
        x: f64,
        y: f64,
        color: impl Into<String>,
        now: Instant,
    ) -> Result<(), ReconcileError> {
        self.check_editable()?;
        let shape = Shape::polyline(id, x, y, color);

        // The initial write claims the first throttle slot.
        self.stroke_throttle.reset();
        let _ = self.stroke_throttle.ready(now);

        let restores = vec![(shape.id.clone(), self.doc.get(&shape.id).cloned())];
        let staged = shape.clone();
        let tx = self.doc.transact(move |tx| {
            let _ = tx.set(staged);
        });
        self.finish_edit(restores, tx);
        self.draft = Some(shape);
        Ok(())
    }

    /// Append a point to the in-progress stroke. The render snapshot sees
    /// every point immediately; the document is written only when the stroke
    /// throttle allows. No-op when no stroke is in progress.
    pub fn extend_stroke(&mut self, x: f64, y: f64, now: Instant) {
        let Some(mut draft) = self.draft.take() else { return };
        if let Some(points) = &mut draft.points {
            points.push(x);
            points.push(y);
        }

        self.render_draft(&draft);
        if self.stroke_throttle.ready(now) {
            self.write_unjournaled(draft.clone());
        }
        self.draft = Some(draft);
    }

    /// Finish the stroke: simplify the full point list once and write the
    /// result as a single update. No-op when no stroke is in progress.
    pub fn end_stroke(&mut self) {
        let Some(mut draft) = self.draft.take() else { return };
        if let Some(points) = draft.points.take() {
            draft.points = Some(simplify(&points, SIMPLIFY_TOLERANCE));
        }
        self.write_unjournaled(draft);
    }

    // =========================================================
    // Undo / redo
    // =========================================================

    /// Walk one step back. Silent no-op when there is nothing to undo.
    pub fn undo(&mut self) {
        let Some(delta) = self.journal.take_undo() else { return };
        let inverse = self.apply_delta(&delta);
        self.journal.push_redo(inverse);
    }

    /// Walk one undone step forward. Silent no-op when there is nothing to
    /// redo.
    pub fn redo(&mut self) {
        let Some(delta) = self.journal.take_redo() else { return };
        let inverse = self.apply_delta(&delta);
        self.journal.restore_undo(inverse);
    }

    // =========================================================
    // Internals
    // =========================================================

    fn check_editable(&self) -> Result<(), ReconcileError> {
        if self.role.can_edit() { Ok(()) } else { Err(ReconcileError::ReadOnly) }
    }

    fn write_shape(&mut self, shape: Shape) -> Result<(), ReconcileError> {
        self.check_editable()?;
        shape.validate()?;
        let restores = vec![(shape.id.clone(), self.doc.get(&shape.id).cloned())];
        let tx = self.doc.transact(move |tx| {
            // Validated above; staging cannot fail.
            let _ = tx.set(shape);
        });
        self.finish_edit(restores, tx);
        Ok(())
    }

    /// Queue a committed local transaction and record its undo entry.
    fn finish_edit(&mut self, restores: Vec<(ShapeId, Option<Shape>)>, tx: Option<replica::Transaction>) {
        let Some(tx) = tx else { return };
        self.journal.record(Delta { restores });
        self.outbound.push_back(Message::Update { tx });
    }

    /// Document write that bypasses the journal; stroke progress updates
    /// must not become separate undo steps.
    fn write_unjournaled(&mut self, shape: Shape) {
        let tx = self.doc.transact(move |tx| {
            let _ = tx.set(shape);
        });
        if let Some(tx) = tx {
            self.outbound.push_back(Message::Update { tx });
        }
    }

    /// Show an in-progress draft in the render snapshot without touching the
    /// document.
    fn render_draft(&mut self, shape: &Shape) {
        self.snapshot
            .lock()
            .expect("render snapshot lock poisoned")
            .insert(shape.id.clone(), shape.clone());
        let mut hooks = self.hooks.lock().expect("subscriber lock poisoned");
        for (_, hook) in hooks.iter_mut() {
            hook();
        }
    }

    /// Apply a journal delta and return its inverse, built from the values
    /// the delta is about to overwrite.
    fn apply_delta(&mut self, delta: &Delta) -> Delta {
        let restores = delta
            .restores
            .iter()
            .map(|(id, _)| (id.clone(), self.doc.get(id).cloned()))
            .collect();

        let staged = delta.restores.clone();
        let tx = self.doc.transact(move |tx| {
            for (id, value) in staged {
                match value {
                    // Journal values were valid when captured.
                    Some(shape) => {
                        let _ = tx.set(shape);
                    }
                    None => tx.delete(id),
                }
            }
        });
        if let Some(tx) = tx {
            self.outbound.push_back(Message::Update { tx });
        }

        Delta { restores }
    }
}
