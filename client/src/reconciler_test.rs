use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;

fn editor() -> Reconciler {
    Reconciler::with_name(Role::Editor, "Tester".into())
}

fn rect(id: &str, x: f64) -> Shape {
    Shape::rectangle(id, x, 0.0, "black")
}

fn snapshot_of(reconciler: &Reconciler) -> HashMap<ShapeId, Shape> {
    reconciler.render_snapshot().lock().unwrap().clone()
}

/// Deliver every queued document update from one reconciler to another.
fn relay(from: &mut Reconciler, to: &mut Reconciler) {
    for message in from.take_outbound() {
        if matches!(message, Message::Update { .. }) {
            to.handle_message(message);
        }
    }
}

// =============================================================
// Local edits
// =============================================================

#[test]
fn create_is_optimistic_and_queued_outbound() {
    let mut board = editor();
    board.create_shape(rect("r1", 10.0)).unwrap();

    // Visible locally before any round trip.
    assert_eq!(board.shape("r1").unwrap().x, 10.0);
    assert!(snapshot_of(&board).contains_key("r1"));

    let outbound = board.take_outbound();
    assert_eq!(outbound.len(), 1);
    assert!(matches!(outbound[0], Message::Update { .. }));
}

#[test]
fn viewer_mutations_are_rejected() {
    let mut board = Reconciler::with_name(Role::Viewer, "Watcher".into());

    assert!(matches!(board.create_shape(rect("r1", 0.0)), Err(ReconcileError::ReadOnly)));
    assert!(matches!(board.delete_shape("r1"), Err(ReconcileError::ReadOnly)));
    assert!(matches!(board.move_selection(&["r1".into()], 1.0, 1.0), Err(ReconcileError::ReadOnly)));
    assert!(board.take_outbound().is_empty());

    // Presence is not a document mutation; viewers still share a pointer.
    board.pointer_moved(5.0, 5.0, Instant::now());
    assert_eq!(board.take_outbound().len(), 1);
}

#[test]
fn invalid_shapes_never_reach_the_document() {
    let mut board = editor();
    let mut bad = rect("r1", 0.0);
    bad.width = Some(-3.0);

    assert!(matches!(board.create_shape(bad), Err(ReconcileError::Shape(_))));
    assert!(board.shape("r1").is_none());
    assert!(board.take_outbound().is_empty());
}

#[test]
fn commit_resize_bakes_scale_and_clamps() {
    let mut board = editor();
    board.create_shape(rect("r1", 0.0)).unwrap();

    let mut stretched = board.shape("r1").unwrap();
    stretched.scale_x = 2.0;
    stretched.scale_y = 0.001;
    board.update_shape(stretched).unwrap();
    board.commit_resize("r1").unwrap();

    let resized = board.shape("r1").unwrap();
    assert_eq!(resized.width, Some(200.0));
    // The collapsed axis clamps to the minimum size.
    assert_eq!(resized.height, Some(canvas::consts::MIN_SHAPE_SIZE));
    assert_eq!(resized.scale_x, 1.0);
    assert_eq!(resized.scale_y, 1.0);

    assert!(matches!(board.commit_resize("ghost"), Err(ReconcileError::UnknownShape(_))));
}

// =============================================================
// Undo / redo
// =============================================================

#[test]
fn undo_removes_create_and_redo_restores_it_identically() {
    let mut board = editor();
    let mut peer = editor();
    board.create_shape(rect("r1", 10.0)).unwrap();
    let original = board.shape("r1").unwrap();
    relay(&mut board, &mut peer);

    board.undo();
    assert!(board.shape("r1").is_none());
    relay(&mut board, &mut peer);
    assert!(peer.shape("r1").is_none());

    board.redo();
    assert_eq!(board.shape("r1"), Some(original.clone()));
    relay(&mut board, &mut peer);
    assert_eq!(peer.shape("r1"), Some(original));
}

#[test]
fn undo_and_redo_on_empty_stacks_are_silent_noops() {
    let mut board = editor();
    board.undo();
    board.redo();
    assert!(board.take_outbound().is_empty());
}

#[test]
fn multi_object_move_is_one_undo_step() {
    let mut board = editor();
    board.create_shape(rect("a", 0.0)).unwrap();
    board.create_shape(rect("b", 50.0)).unwrap();

    let ids: Vec<ShapeId> = vec!["a".into(), "b".into()];
    board.move_selection(&ids, 10.0, 20.0).unwrap();
    assert_eq!(board.shape("a").unwrap().x, 10.0);
    assert_eq!(board.shape("b").unwrap().x, 60.0);

    board.undo();
    assert_eq!(board.shape("a").unwrap().x, 0.0);
    assert_eq!(board.shape("b").unwrap().x, 50.0);
}

#[test]
fn nudge_moves_by_ten_pixel_steps() {
    let mut board = editor();
    board.create_shape(rect("a", 0.0)).unwrap();

    let ids: Vec<ShapeId> = vec!["a".into()];
    board.nudge_selection(&ids, 1.0, -1.0).unwrap();
    let nudged = board.shape("a").unwrap();
    assert_eq!(nudged.x, 10.0);
    assert_eq!(nudged.y, -10.0);
}

#[test]
fn multi_object_delete_is_one_undo_step() {
    let mut board = editor();
    board.create_shape(rect("a", 0.0)).unwrap();
    board.create_shape(rect("b", 50.0)).unwrap();

    let ids: Vec<ShapeId> = vec!["a".into(), "b".into()];
    board.delete_selection(&ids).unwrap();
    assert!(board.shape("a").is_none());
    assert!(board.shape("b").is_none());

    board.undo();
    assert!(board.shape("a").is_some());
    assert!(board.shape("b").is_some());
}

#[test]
fn remote_merges_are_not_undoable() {
    let mut board = editor();
    let mut peer = editor();
    board.create_shape(rect("r1", 0.0)).unwrap();
    relay(&mut board, &mut peer);

    peer.undo();
    assert!(peer.shape("r1").is_some());
    assert!(peer.take_outbound().is_empty());
}

#[test]
fn a_fresh_edit_clears_the_redo_stack() {
    let mut board = editor();
    board.create_shape(rect("a", 0.0)).unwrap();
    board.undo();
    board.create_shape(rect("b", 0.0)).unwrap();

    board.redo();
    assert!(board.shape("a").is_none());
}

// =============================================================
// Freehand strokes
// =============================================================

#[test]
fn stroke_points_render_immediately_but_document_writes_are_throttled() {
    let start = Instant::now();
    let mut board = editor();
    board.begin_stroke("s", 0.0, 0.0, "black", start).unwrap();
    assert_eq!(board.take_outbound().len(), 1);

    // Inside the throttle window: local only.
    board.extend_stroke(1.0, 0.0, start + Duration::from_millis(10));
    board.extend_stroke(2.0, 1.0, start + Duration::from_millis(20));
    assert_eq!(snapshot_of(&board)["s"].points.as_ref().unwrap().len(), 6);
    assert_eq!(board.shape("s").unwrap().points.unwrap().len(), 2);
    assert!(board.take_outbound().is_empty());

    // Past the window: the document catches up in one write.
    board.extend_stroke(3.0, 0.0, start + Duration::from_millis(60));
    assert_eq!(board.shape("s").unwrap().points.unwrap().len(), 8);
    assert_eq!(board.take_outbound().len(), 1);
}

#[test]
fn end_stroke_writes_the_simplified_path_once() {
    let start = Instant::now();
    let mut board = editor();
    board.begin_stroke("s", 0.0, 0.0, "black", start).unwrap();
    for i in 1..=4u32 {
        board.extend_stroke(f64::from(i), 0.0, start + Duration::from_millis(u64::from(i)));
    }
    board.end_stroke();

    // Collinear interior points are gone from the final record.
    assert_eq!(board.shape("s").unwrap().points.unwrap(), vec![0.0, 0.0, 4.0, 0.0]);

    // A finished stroke is one undo step.
    board.undo();
    assert!(board.shape("s").is_none());
}

#[test]
fn stroke_calls_without_a_draft_are_noops() {
    let mut board = editor();
    board.extend_stroke(1.0, 1.0, Instant::now());
    board.end_stroke();
    assert!(board.take_outbound().is_empty());
}

// =============================================================
// Presence and inbound frames
// =============================================================

#[test]
fn pointer_emissions_are_bounded_by_the_throttle() {
    let start = Instant::now();
    let mut board = editor();

    let mut t = Duration::ZERO;
    while t <= Duration::from_millis(500) {
        board.pointer_moved(1.0, 1.0, start + t);
        t += Duration::from_millis(5);
    }

    let presence = board
        .take_outbound()
        .into_iter()
        .filter(|m| matches!(m, Message::Presence { .. }))
        .count();
    assert!(presence <= 6, "{presence} presence frames for 500ms at 100ms throttle");
    assert!(presence >= 2);
}

#[test]
fn custom_throttle_intervals_apply() {
    let start = Instant::now();
    let mut board = editor().with_throttles(Duration::from_millis(10), Duration::from_millis(10));

    board.pointer_moved(0.0, 0.0, start);
    board.pointer_moved(0.0, 0.0, start + Duration::from_millis(5));
    board.pointer_moved(0.0, 0.0, start + Duration::from_millis(12));
    assert_eq!(board.take_outbound().len(), 2);
}

#[test]
fn welcome_adopts_the_relay_session_id() {
    let mut board = editor();
    assert_eq!(board.session_id(), None);

    let id = Uuid::new_v4();
    board.handle_message(Message::Welcome { session_id: id });
    assert_eq!(board.session_id(), Some(id));
}

#[test]
fn initial_sync_hydrates_the_render_snapshot() {
    let mut source = Replica::new(Uuid::new_v4());
    source.set(rect("r1", 10.0)).unwrap();

    let mut board = editor();
    board.handle_message(Message::SyncDoc { state: source.state() });
    assert!(snapshot_of(&board).contains_key("r1"));
    assert_eq!(board.shape("r1").unwrap().x, 10.0);
}

#[test]
fn peer_presence_appears_and_leaves() {
    let mut board = editor();
    let peer_id = Uuid::new_v4();

    board.handle_message(Message::Presence {
        session_id: Some(peer_id),
        x: 7.0,
        y: 8.0,
        name: "SwiftPanda".into(),
    });
    assert_eq!(board.peers()[&peer_id].x, 7.0);

    board.handle_message(Message::PresenceLeave { session_id: peer_id });
    assert!(board.peers().is_empty());
}

// =============================================================
// Snapshot subscriptions
// =============================================================

#[test]
fn subscribers_fire_once_per_transaction_until_unsubscribed() {
    let mut board = editor();
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&fired);
    let id = board.subscribe(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    board.create_shape(rect("a", 0.0)).unwrap();
    let ids: Vec<ShapeId> = vec!["a".into()];
    board.move_selection(&ids, 1.0, 1.0).unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 2);

    board.unsubscribe(id);
    board.delete_shape("a").unwrap();
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

// =============================================================
// Convergence across reconcilers
// =============================================================

#[test]
fn concurrent_edits_converge_after_exchange() {
    let mut alice = editor();
    let mut bob = editor();
    alice.create_shape(rect("r1", 0.0)).unwrap();
    relay(&mut alice, &mut bob);

    // Both edit r1 before seeing each other's write.
    let mut from_alice = alice.shape("r1").unwrap();
    from_alice.x = 111.0;
    alice.update_shape(from_alice).unwrap();

    let mut from_bob = bob.shape("r1").unwrap();
    from_bob.color = "red".into();
    bob.update_shape(from_bob).unwrap();

    relay(&mut alice, &mut bob);
    relay(&mut bob, &mut alice);

    assert_eq!(alice.shape("r1"), bob.shape("r1"));
}

#[test]
fn marquee_selection_reads_the_document() {
    let mut board = editor();
    board.create_shape(rect("inside", 10.0)).unwrap();
    board.create_shape(rect("outside", 500.0)).unwrap();

    let region = Aabb { min_x: 0.0, min_y: 0.0, max_x: 120.0, max_y: 120.0 };
    let hits = board.select_in(&region);
    assert_eq!(hits, vec!["inside".to_owned()]);
}
