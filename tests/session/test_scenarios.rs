// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Full chat scenarios: session controllers talking through a live relay

use std::time::Duration;

use anyhow::{anyhow, Result};
use cipher_relay::config::RelayConfig;
use cipher_relay::relay::{RelayServer, ServerHandle, ServerMessage};
use cipher_relay::session::{
    ConversationScope, DisplayMessage, OutgoingBatch, ScopeMode, SessionController, SessionError,
    SessionEvent,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

struct ChatPeer {
    controller: SessionController,
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ChatPeer {
    async fn join(handle: &ServerHandle, name: &str) -> Result<Self> {
        let controller = SessionController::generate(name, ScopeMode::ExplicitFlag)?;
        let (mut ws, _) = connect_async(handle.ws_url()).await?;
        ws.send(Message::Text(controller.register_message().to_frame()))
            .await?;
        Ok(Self { controller, ws })
    }

    async fn next_event(&mut self) -> Result<SessionEvent> {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), self.ws.next())
                .await
                .map_err(|_| anyhow!("{} timed out", self.controller.username()))?
                .ok_or_else(|| anyhow!("connection closed"))??;
            if let Message::Text(text) = msg {
                let server_msg: ServerMessage = serde_json::from_str(&text)?;
                return Ok(self.controller.handle_server_message(server_msg).await);
            }
        }
    }

    async fn await_online(&mut self, count: usize) -> Result<()> {
        while self.controller.online() != count {
            self.next_event().await?;
        }
        Ok(())
    }

    async fn next_chat(&mut self) -> Result<DisplayMessage> {
        loop {
            if let SessionEvent::Message(message) = self.next_event().await? {
                return Ok(message);
            }
        }
    }

    async fn say(&mut self, text: &str) -> Result<OutgoingBatch> {
        let batch = self
            .controller
            .prepare_send(text)
            .await?
            .ok_or_else(|| anyhow!("nothing to send"))?;
        for frame in &batch.frames {
            self.ws
                .send(Message::Text(frame.message.to_frame()))
                .await?;
        }
        Ok(batch)
    }

    async fn expect_no_chat(&mut self) {
        let result =
            tokio::time::timeout(Duration::from_millis(300), self.next_chat()).await;
        assert!(result.is_err(), "unexpected chat message: {:?}", result);
    }
}

async fn relay() -> Result<ServerHandle> {
    RelayServer::new(RelayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        ..RelayConfig::default()
    })
    .start()
    .await
}

#[tokio::test]
async fn test_broadcast_between_two_peers() -> Result<()> {
    let handle = relay().await?;
    let mut alice = ChatPeer::join(&handle, "alice").await?;
    alice.await_online(1).await?;
    let mut bob = ChatPeer::join(&handle, "bob").await?;
    alice.await_online(2).await?;
    bob.await_online(2).await?;

    let batch = alice.say("hi").await?;
    assert_eq!(batch.frames.len(), 1);
    assert_eq!(batch.echo.text, "hi");
    assert_eq!(batch.echo.scope, ConversationScope::Group);

    let received = bob.next_chat().await?;
    assert_eq!(received.from, "alice");
    assert_eq!(received.text, "hi");
    assert_eq!(received.scope, ConversationScope::Group);
    assert!(received.decrypted);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_oversized_message_is_refused_before_the_relay() -> Result<()> {
    let handle = relay().await?;
    let mut alice = ChatPeer::join(&handle, "alice").await?;
    alice.await_online(1).await?;
    let mut bob = ChatPeer::join(&handle, "bob").await?;
    alice.await_online(2).await?;
    bob.await_online(2).await?;

    let long_text = "a".repeat(50 * 1024);
    let result = alice.controller.prepare_send(&long_text).await;
    assert!(
        matches!(result, Err(SessionError::MessageTooLarge { .. })),
        "expected MessageTooLarge, got {:?}",
        result.map(|batch| batch.map(|b| b.frames.len()))
    );

    // alice stays connected and can keep talking
    assert_eq!(handle.registry().len().await, 2);
    alice.say("shorter then").await?;
    let received = bob.next_chat().await?;
    assert_eq!(received.from, "alice");
    assert_eq!(received.text, "shorter then");
    assert_eq!(handle.registry().len().await, 2);

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_private_message_among_three() -> Result<()> {
    let handle = relay().await?;
    let mut alice = ChatPeer::join(&handle, "alice").await?;
    alice.await_online(1).await?;
    let mut bob = ChatPeer::join(&handle, "bob").await?;
    bob.await_online(2).await?;
    let mut carol = ChatPeer::join(&handle, "carol").await?;
    carol.await_online(3).await?;
    alice.await_online(3).await?;
    bob.await_online(3).await?;

    alice.controller.select("bob")?;
    let batch = alice.say("secret").await?;
    assert_eq!(batch.frames.len(), 1);
    assert_eq!(batch.echo.scope, ConversationScope::Private);

    let received = bob.next_chat().await?;
    assert_eq!(received.text, "secret");
    assert_eq!(received.scope, ConversationScope::Private);

    carol.expect_no_chat().await;

    handle.shutdown().await?;
    Ok(())
}

#[tokio::test]
async fn test_send_to_departed_peer_is_silent() -> Result<()> {
    let handle = relay().await?;
    let mut alice = ChatPeer::join(&handle, "alice").await?;
    alice.await_online(1).await?;
    let mut bob = ChatPeer::join(&handle, "bob").await?;
    alice.await_online(2).await?;
    bob.await_online(2).await?;

    alice.controller.select("bob")?;
    bob.ws.close(None).await?;

    // Wait until the relay has dropped bob, without letting alice see it yet
    let registry = handle.registry();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while registry.len().await != 1 {
        assert!(tokio::time::Instant::now() < deadline, "bob never left");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let batch = alice.say("are you there?").await?;
    assert_eq!(batch.frames.len(), 1);
    assert!(batch.failures.is_empty());
    assert_eq!(batch.echo.text, "are you there?");
    assert_eq!(batch.echo.scope, ConversationScope::Private);

    // alice only hears about the departure, never an error or a bounce
    match alice.next_event().await? {
        SessionEvent::Directory(update) => {
            assert!(update.peers.is_empty());
            assert_eq!(update.cleared_selection.as_deref(), Some("bob"));
        }
        other => panic!("expected directory update, got {:?}", other),
    }
    alice.expect_no_chat().await;

    handle.shutdown().await?;
    Ok(())
}
