// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end tests against a running relay on an ephemeral port

use std::time::Duration;

use anyhow::{anyhow, Result};
use cipher_relay::config::RelayConfig;
use cipher_relay::relay::{RelayServer, ServerHandle, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn test_config() -> RelayConfig {
    RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        max_connections: 16,
        max_frame_bytes: 4096,
    }
}

async fn start(config: RelayConfig) -> Result<ServerHandle> {
    RelayServer::new(config).start().await
}

async fn connect(handle: &ServerHandle) -> Result<Client> {
    let (ws, _) = connect_async(handle.ws_url()).await?;
    Ok(ws)
}

async fn send(client: &mut Client, frame: &str) -> Result<()> {
    client.send(Message::Text(frame.to_string())).await?;
    Ok(())
}

async fn next_message(client: &mut Client) -> Result<ServerMessage> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for frame"))?
            .ok_or_else(|| anyhow!("connection closed"))??;
        if let Message::Text(text) = msg {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

async fn expect_silence(client: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}

async fn register(client: &mut Client, name: &str) -> Result<()> {
    send(
        client,
        &format!(r#"{{"type":"register","username":"{}","publicKey":"pk-{}"}}"#, name, name),
    )
    .await
}

fn usernames(msg: &ServerMessage) -> Vec<String> {
    match msg {
        ServerMessage::Userlist { list } => list.iter().map(|e| e.username.clone()).collect(),
        other => panic!("expected userlist, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_and_route_over_websocket() -> Result<()> {
    let handle = start(test_config()).await?;
    let mut alice = connect(&handle).await?;
    let mut bob = connect(&handle).await?;

    register(&mut alice, "alice").await?;
    assert_eq!(usernames(&next_message(&mut alice).await?), vec!["alice"]);

    register(&mut bob, "bob").await?;
    assert_eq!(usernames(&next_message(&mut alice).await?), vec!["alice", "bob"]);
    assert_eq!(usernames(&next_message(&mut bob).await?), vec!["alice", "bob"]);

    send(
        &mut alice,
        r#"{"type":"send","from":"alice","to":["bob"],"payload":"opaque-bytes"}"#,
    )
    .await?;
    assert_eq!(
        next_message(&mut bob).await?,
        ServerMessage::Message {
            from: "alice".to_string(),
            payload: "opaque-bytes".to_string(),
        }
    );
    expect_silence(&mut alice).await;

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_malformed_frames_keep_connection_open() -> Result<()> {
    let handle = start(test_config()).await?;
    let mut alice = connect(&handle).await?;

    send(&mut alice, "this is not json").await?;
    send(&mut alice, r#"{"type":"teleport"}"#).await?;
    send(&mut alice, r#"{"type":"register","username":"","publicKey":"x"}"#).await?;
    alice.send(Message::Binary(vec![1, 2, 3])).await?;

    // Still served afterwards
    send(&mut alice, r#"{"type":"list"}"#).await?;
    assert!(usernames(&next_message(&mut alice).await?).is_empty());

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_disconnect_broadcasts_departure() -> Result<()> {
    let handle = start(test_config()).await?;
    let mut alice = connect(&handle).await?;
    let mut bob = connect(&handle).await?;

    register(&mut alice, "alice").await?;
    next_message(&mut alice).await?;
    register(&mut bob, "bob").await?;
    next_message(&mut alice).await?;
    next_message(&mut bob).await?;

    bob.close(None).await?;
    assert_eq!(usernames(&next_message(&mut alice).await?), vec!["alice"]);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_oversized_frame_closes_only_that_connection() -> Result<()> {
    let handle = start(test_config()).await?;
    let mut alice = connect(&handle).await?;
    let mut mallory = connect(&handle).await?;

    register(&mut alice, "alice").await?;
    next_message(&mut alice).await?;

    let huge = format!(
        r#"{{"type":"send","to":["alice"],"payload":"{}"}}"#,
        "x".repeat(16 * 1024)
    );
    mallory.send(Message::Text(huge)).await.ok();

    // alice is unaffected
    send(&mut alice, r#"{"type":"list"}"#).await?;
    assert_eq!(usernames(&next_message(&mut alice).await?), vec!["alice"]);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_connection_limit() -> Result<()> {
    let handle = start(RelayConfig {
        max_connections: 1,
        ..test_config()
    })
    .await?;

    let mut first = connect(&handle).await?;
    register(&mut first, "first").await?;
    next_message(&mut first).await?;

    // The second socket is dropped before the handshake completes
    let second = tokio::time::timeout(Duration::from_secs(2), connect_async(handle.ws_url())).await;
    assert!(matches!(second, Ok(Err(_))));
    assert_eq!(handle.connection_count().await, 1);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_clients() -> Result<()> {
    let handle = start(test_config()).await?;
    let mut alice = connect(&handle).await?;
    register(&mut alice, "alice").await?;
    next_message(&mut alice).await?;

    let registry = handle.registry();
    handle.shutdown().await?;

    assert!(registry.is_empty().await);
    let next = tokio::time::timeout(Duration::from_secs(2), alice.next()).await?;
    assert!(matches!(next, None | Some(Ok(Message::Close(_))) | Some(Err(_))));
    Ok(())
}
