use std::time::Duration;

use canvas::Shape;
use futures::{SinkExt, StreamExt};
use replica::Replica;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite;

use super::*;
use crate::state::test_helpers;

type Client = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn make_update(seed: u128, id: &str, x: f64) -> Message {
    let mut doc = Replica::new(Uuid::from_u128(seed));
    let tx = doc.set(Shape::rectangle(id, x, 0.0, "blue")).unwrap();
    Message::Update { tx }
}

// =============================================================
// Dispatch (no sockets)
// =============================================================

#[tokio::test]
async fn update_is_relayed_to_peers_but_not_echoed() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let origin = Uuid::new_v4();
    let peer = Uuid::new_v4();

    let (origin_tx, mut origin_rx) = mpsc::channel(16);
    let (peer_tx, mut peer_rx) = mpsc::channel(16);
    services::doc::join(&state, "room", origin, origin_tx).await;
    services::doc::join(&state, "room", peer, peer_tx).await;

    let update = make_update(1, "r1", 5.0);
    dispatch(&state, "room", origin, &encode_message(&update)).await;

    assert_eq!(peer_rx.try_recv().ok(), Some(update));
    assert!(origin_rx.try_recv().is_err());

    // The merge reached the authoritative replica.
    let docs = state.docs.read().await;
    assert_eq!(docs.get("room").unwrap().replica.len(), 1);
}

#[tokio::test]
async fn redelivered_update_is_not_rebroadcast() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let origin = Uuid::new_v4();
    let peer = Uuid::new_v4();

    let (origin_tx, _origin_rx) = mpsc::channel(16);
    let (peer_tx, mut peer_rx) = mpsc::channel(16);
    services::doc::join(&state, "room", origin, origin_tx).await;
    services::doc::join(&state, "room", peer, peer_tx).await;

    let update = make_update(1, "r1", 5.0);
    dispatch(&state, "room", origin, &encode_message(&update)).await;
    dispatch(&state, "room", origin, &encode_message(&update)).await;

    assert!(peer_rx.try_recv().is_ok());
    assert!(peer_rx.try_recv().is_err());
}

#[tokio::test]
async fn presence_is_stamped_and_relayed() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let origin = Uuid::new_v4();
    let peer = Uuid::new_v4();

    let (origin_tx, _origin_rx) = mpsc::channel(16);
    let (peer_tx, mut peer_rx) = mpsc::channel(16);
    services::doc::join(&state, "room", origin, origin_tx).await;
    services::doc::join(&state, "room", peer, peer_tx).await;

    let inbound = Message::Presence { session_id: None, x: 3.0, y: 4.0, name: "CleverFox".into() };
    dispatch(&state, "room", origin, &encode_message(&inbound)).await;

    let relayed = peer_rx.try_recv().expect("peer should see presence");
    assert_eq!(
        relayed,
        Message::Presence { session_id: Some(origin), x: 3.0, y: 4.0, name: "CleverFox".into() }
    );
}

#[tokio::test]
async fn malformed_inbound_is_dropped_without_side_effects() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let origin = Uuid::new_v4();
    let peer = Uuid::new_v4();

    let (origin_tx, _origin_rx) = mpsc::channel(16);
    let (peer_tx, mut peer_rx) = mpsc::channel(16);
    services::doc::join(&state, "room", origin, origin_tx).await;
    services::doc::join(&state, "room", peer, peer_tx).await;

    dispatch(&state, "room", origin, "{{{ not a frame").await;
    dispatch(&state, "room", origin, r#"{"type":"sync_doc","state":{"entries":{}}}"#).await;

    assert!(peer_rx.try_recv().is_err());
    assert!(state.docs.read().await.get("room").unwrap().replica.is_empty());
}

// =============================================================
// End-to-end over real sockets
// =============================================================

async fn spawn_server(state: AppState) -> std::net::SocketAddr {
    let app = crate::routes::app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    addr
}

async fn connect(addr: std::net::SocketAddr, doc: &str) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws/{doc}"))
        .await
        .expect("connect");
    client
}

async fn recv_message(client: &mut Client) -> Message {
    loop {
        let frame = timeout(Duration::from_secs(2), client.next())
            .await
            .expect("receive timed out")
            .expect("connection closed")
            .expect("ws error");
        if let tungstenite::Message::Text(text) = frame {
            return decode_message(text.as_str()).expect("decode");
        }
    }
}

async fn send(client: &mut Client, message: &Message) {
    client
        .send(tungstenite::Message::Text(encode_message(message).into()))
        .await
        .expect("send");
}

#[tokio::test]
async fn relay_end_to_end() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let addr = spawn_server(state.clone()).await;

    // First client: welcome + empty initial sync.
    let mut alice = connect(addr, "room").await;
    let Message::Welcome { session_id: _alice_id } = recv_message(&mut alice).await else {
        panic!("expected welcome first");
    };
    let Message::SyncDoc { state: doc_state } = recv_message(&mut alice).await else {
        panic!("expected sync_doc second");
    };
    assert!(doc_state.entries.is_empty());

    // Alice creates a rectangle.
    send(&mut alice, &make_update(1, "r1", 42.0)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second client sees the rectangle in its initial sync.
    let mut bob = connect(addr, "room").await;
    let Message::Welcome { session_id: bob_id } = recv_message(&mut bob).await else {
        panic!("expected welcome");
    };
    let Message::SyncDoc { state: doc_state } = recv_message(&mut bob).await else {
        panic!("expected sync_doc");
    };
    assert!(doc_state.entries.contains_key("r1"));

    // Bob's presence reaches Alice, stamped with Bob's session id.
    send(&mut bob, &Message::Presence { session_id: None, x: 9.0, y: 9.0, name: "Bob".into() }).await;
    let Message::Presence { session_id, name, .. } = recv_message(&mut alice).await else {
        panic!("expected presence");
    };
    assert_eq!(session_id, Some(bob_id));
    assert_eq!(name, "Bob");

    // Bob disconnects; Alice is told to drop his presence entry.
    drop(bob);
    let Message::PresenceLeave { session_id } = recv_message(&mut alice).await else {
        panic!("expected presence_leave");
    };
    assert_eq!(session_id, bob_id);

    // The debounced snapshot eventually lands on disk.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let bytes = state.store.load("room").await.unwrap().expect("snapshot");
    assert!(replica::ReplicaState::decode(&bytes).unwrap().entries.contains_key("r1"));
}

#[tokio::test]
async fn documents_are_isolated_by_name() {
    let (_dir, state) = test_helpers::test_app_state().await;
    let addr = spawn_server(state).await;

    let mut alice = connect(addr, "alpha").await;
    recv_message(&mut alice).await; // welcome
    recv_message(&mut alice).await; // sync_doc
    send(&mut alice, &make_update(1, "r1", 1.0)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut carol = connect(addr, "beta").await;
    recv_message(&mut carol).await; // welcome
    let Message::SyncDoc { state: doc_state } = recv_message(&mut carol).await else {
        panic!("expected sync_doc");
    };
    assert!(doc_state.entries.is_empty());
}
