use std::time::Duration;

use canvas::Shape;
use replica::{Replica, ReplicaState};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::*;
use crate::services::doc;
use crate::state::test_helpers;

async fn join_and_mutate(state: &crate::state::AppState, writer_seed: u128, x: f64) {
    let (tx, _rx) = mpsc::channel(4);
    doc::join(state, "room", Uuid::new_v4(), tx).await;

    // Deterministic writer ids so later writers win the per-key tie-break.
    let mut writer = Replica::new(Uuid::from_u128(writer_seed));
    let update = writer.set(Shape::rectangle("r1", x, 0.0, "blue")).unwrap();
    doc::merge_update(state, "room", &update).await;
}

#[tokio::test]
async fn debounced_save_lands_after_quiet_period() {
    let (_dir, state) = test_helpers::test_app_state().await;
    join_and_mutate(&state, 1, 1.0).await;
    schedule_save(&state, "room").await;

    assert!(state.store.load("room").await.unwrap().is_none());

    // Debounce in tests is 25ms; give it room.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let bytes = state.store.load("room").await.unwrap().expect("snapshot written");
    let snapshot = ReplicaState::decode(&bytes).unwrap();
    assert!(snapshot.entries.contains_key("r1"));
    assert!(!state.docs.read().await.get("room").unwrap().dirty);
}

#[tokio::test]
async fn rapid_mutations_coalesce_into_the_final_state() {
    let (_dir, state) = test_helpers::test_app_state().await;
    join_and_mutate(&state, 1, 1.0).await;
    schedule_save(&state, "room").await;
    join_and_mutate(&state, 2, 99.0).await;
    schedule_save(&state, "room").await;

    tokio::time::sleep(Duration::from_millis(200)).await;

    let bytes = state.store.load("room").await.unwrap().expect("snapshot written");
    let snapshot = ReplicaState::decode(&bytes).unwrap();
    let shape = snapshot.entries.get("r1").unwrap().value.as_ref().unwrap();
    assert!((shape.x - 99.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn flush_all_writes_without_waiting_for_the_debounce() {
    let (_dir, state) = test_helpers::test_app_state().await;
    join_and_mutate(&state, 1, 7.0).await;

    flush_all(&state).await;

    let bytes = state.store.load("room").await.unwrap().expect("snapshot written");
    assert!(ReplicaState::decode(&bytes).unwrap().entries.contains_key("r1"));
    assert!(!state.docs.read().await.get("room").unwrap().dirty);
}

#[tokio::test]
async fn flush_all_skips_clean_documents() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let (tx, _rx) = mpsc::channel(4);
    doc::join(&state, "room", Uuid::new_v4(), tx).await;

    flush_all(&state).await;
    assert!(state.store.load("room").await.unwrap().is_none());
}
