// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tests for the relay registry under concurrent joins, leaves and sends

use std::sync::Arc;

use cipher_relay::relay::{ConnectionHandle, Identity, Registry, ServerMessage};
use tokio::sync::mpsc::UnboundedReceiver;

fn identity(name: &str, key: &str) -> Identity {
    Identity {
        username: name.to_string(),
        public_key: key.to_string(),
    }
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<ServerMessage> {
    let mut frames = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        frames.push(serde_json::from_str(&frame).unwrap());
    }
    frames
}

fn last_directory(frames: &[ServerMessage]) -> Vec<String> {
    frames
        .iter()
        .rev()
        .find_map(|frame| match frame {
            ServerMessage::Userlist { list } => {
                Some(list.iter().map(|e| e.username.clone()).collect())
            }
            _ => None,
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn test_last_write_wins_on_duplicate_name() {
    let registry = Registry::new();
    let (first, mut first_rx) = ConnectionHandle::channel();
    let (second, mut second_rx) = ConnectionHandle::channel();

    registry.register(&first, identity("alice", "key-1")).await;
    registry.register(&second, identity("alice", "key-2")).await;

    let snapshot = registry.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].public_key, "key-2");

    drain(&mut first_rx);
    drain(&mut second_rx);

    // Messages for alice now reach the second connection only
    registry.route("bob", &["alice".to_string()], "p").await;
    assert!(drain(&mut first_rx).is_empty());
    assert_eq!(drain(&mut second_rx).len(), 1);

    // The displaced connection leaving must not evict the new owner
    assert!(!registry.deregister(first.id()).await);
    assert_eq!(registry.len().await, 1);
}

#[tokio::test]
async fn test_departure_broadcasts_to_remaining_peers() {
    let registry = Registry::new();
    let (alice, mut alice_rx) = ConnectionHandle::channel();
    let (bob, mut bob_rx) = ConnectionHandle::channel();

    registry.register(&alice, identity("alice", "a")).await;
    registry.register(&bob, identity("bob", "b")).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    assert!(registry.deregister(bob.id()).await);

    let frames = drain(&mut alice_rx);
    assert_eq!(last_directory(&frames), vec!["alice".to_string()]);
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn test_unregistered_connections_get_no_broadcasts() {
    let registry = Registry::new();
    let (_lurker, mut lurker_rx) = ConnectionHandle::channel();
    let (alice, _alice_rx) = ConnectionHandle::channel();

    registry.register(&alice, identity("alice", "a")).await;
    assert!(drain(&mut lurker_rx).is_empty());
}

#[tokio::test]
async fn test_routing_isolation() {
    let registry = Registry::new();
    let (alice, mut alice_rx) = ConnectionHandle::channel();
    let (bob, mut bob_rx) = ConnectionHandle::channel();
    let (carol, mut carol_rx) = ConnectionHandle::channel();

    registry.register(&alice, identity("alice", "a")).await;
    registry.register(&bob, identity("bob", "b")).await;
    registry.register(&carol, identity("carol", "c")).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);
    drain(&mut carol_rx);

    let delivered = registry
        .route("alice", &["bob".to_string()], "envelope-for-bob")
        .await;
    assert_eq!(delivered, 1);

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::Message {
            from: "alice".to_string(),
            payload: "envelope-for-bob".to_string(),
        }]
    );
    assert!(drain(&mut carol_rx).is_empty());
    assert!(drain(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn test_route_to_closed_connection_is_silent() {
    let registry = Registry::new();
    let (bob, bob_rx) = ConnectionHandle::channel();
    registry.register(&bob, identity("bob", "b")).await;

    // Writer side gone but deregister has not run yet
    drop(bob_rx);

    let delivered = registry.route("alice", &["bob".to_string()], "p").await;
    assert_eq!(delivered, 0);
}

#[tokio::test]
async fn test_concurrent_register_deregister_consistency() {
    let registry = Arc::new(Registry::new());
    let (observer, mut observer_rx) = ConnectionHandle::channel();
    registry.register(&observer, identity("observer", "o")).await;

    let mut tasks = Vec::new();
    for i in 0..50 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            let (conn, _rx) = ConnectionHandle::channel();
            let name = format!("user-{}", i);
            registry.register(&conn, identity(&name, &name)).await;
            if i % 2 == 0 {
                registry.deregister(conn.id()).await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Exactly the odd users plus the observer remain
    let mut expected: Vec<String> = (0..50)
        .filter(|i| i % 2 == 1)
        .map(|i| format!("user-{}", i))
        .collect();
    expected.push("observer".to_string());
    expected.sort();

    let snapshot: Vec<String> = registry
        .snapshot()
        .await
        .into_iter()
        .map(|e| e.username)
        .collect();
    assert_eq!(snapshot, expected);

    // The last broadcast the observer saw equals the final state
    let frames = drain(&mut observer_rx);
    assert_eq!(frames.len(), 1 + 50 + 25);
    assert_eq!(last_directory(&frames), expected);
}
