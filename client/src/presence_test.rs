use super::*;

fn presence(session_id: Option<Uuid>, x: f64, name: &str) -> Message {
    Message::Presence { session_id, x, y: 0.0, name: name.into() }
}

#[test]
fn stamped_frames_update_the_peer_map() {
    let id = Uuid::new_v4();
    let mut view = PresenceView::new();

    view.apply(&presence(Some(id), 10.0, "CleverFox"));
    let peer = &view.peers()[&id];
    assert_eq!(peer.x, 10.0);
    assert_eq!(peer.name, "CleverFox");

    // Last write wins per session.
    view.apply(&presence(Some(id), 20.0, "CleverFox"));
    assert_eq!(view.peers()[&id].x, 20.0);
    assert_eq!(view.peers().len(), 1);
}

#[test]
fn unstamped_frames_are_dropped() {
    let mut view = PresenceView::new();
    view.apply(&presence(None, 10.0, "Ghost"));
    assert!(view.peers().is_empty());
}

#[test]
fn leave_removes_only_that_session() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let mut view = PresenceView::new();
    view.apply(&presence(Some(a), 1.0, "A"));
    view.apply(&presence(Some(b), 2.0, "B"));

    view.apply(&Message::PresenceLeave { session_id: a });
    assert!(!view.peers().contains_key(&a));
    assert!(view.peers().contains_key(&b));
}

#[test]
fn peer_color_is_stable_for_a_session() {
    let id = Uuid::new_v4();
    let mut view = PresenceView::new();
    view.apply(&presence(Some(id), 1.0, "A"));
    let first = view.peers()[&id].color;
    view.apply(&presence(Some(id), 2.0, "A"));
    assert_eq!(view.peers()[&id].color, first);
    assert!(canvas::consts::USER_COLORS.contains(&first));
}
