// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::{
    accept_async_with_config,
    tungstenite::{protocol::WebSocketConfig, Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{handle_frame, ConnectionHandle, FrameOutcome, IdentityProvider, Registry, SelfAsserted};
use crate::config::RelayConfig;

type ConnectionMap = Arc<RwLock<HashMap<String, SocketAddr>>>;

pub struct RelayServer {
    config: RelayConfig,
    registry: Arc<Registry>,
    identity: Arc<dyn IdentityProvider>,
    connections: ConnectionMap,
}

struct ConnectionContext {
    registry: Arc<Registry>,
    identity: Arc<dyn IdentityProvider>,
    connections: ConnectionMap,
    max_frame_bytes: usize,
    shutdown: CancellationToken,
}

impl RelayServer {
    /// Server with self-asserted identities
    pub fn new(config: RelayConfig) -> Self {
        Self::with_identity_provider(config, Arc::new(SelfAsserted))
    }

    pub fn with_identity_provider(config: RelayConfig, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            config,
            registry: Arc::new(Registry::new()),
            identity,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub async fn start(&self) -> Result<ServerHandle> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!("🚀 Relay listening on {}", local_addr);

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let shutdown = CancellationToken::new();

        let context = Arc::new(ConnectionContext {
            registry: self.registry.clone(),
            identity: self.identity.clone(),
            connections: self.connections.clone(),
            max_frame_bytes: self.config.max_frame_bytes,
            shutdown: shutdown.clone(),
        });
        let max_connections = self.config.max_connections;

        let accept_handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok((stream, peer)) => {
                                let conn_count = context.connections.read().await.len();
                                if conn_count >= max_connections {
                                    warn!("Connection limit reached, rejecting {}", peer);
                                    continue;
                                }

                                let conn_id = format!("conn-{}", uuid::Uuid::new_v4());
                                context.connections.write().await.insert(conn_id.clone(), peer);
                                tokio::spawn(handle_connection(stream, peer, conn_id, context.clone()));
                            }
                            Err(e) => {
                                error!("Failed to accept connection: {}", e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Shutting down relay");
                        context.shutdown.cancel();
                        break;
                    }
                }
            }
        });

        Ok(ServerHandle {
            local_addr,
            connections: self.connections.clone(),
            registry: self.registry.clone(),
            shutdown_tx,
            accept_handle: Some(accept_handle),
        })
    }
}

pub struct ServerHandle {
    local_addr: SocketAddr,
    connections: ConnectionMap,
    registry: Arc<Registry>,
    shutdown_tx: mpsc::Sender<()>,
    accept_handle: Option<tokio::task::JoinHandle<()>>,
}

impl ServerHandle {
    /// Address actually bound, useful when the configured port is 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.local_addr)
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Stop accepting, close every open connection and wait for the accept loop
    pub async fn shutdown(mut self) -> Result<()> {
        self.shutdown_tx.send(()).await.ok();

        if let Some(handle) = self.accept_handle.take() {
            if tokio::time::timeout(Duration::from_secs(1), handle).await.is_err() {
                warn!("Accept loop did not stop in time");
            }
        }

        // Connection tasks observe the cancelled token and deregister themselves
        let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
        while self.connection_count().await > 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        info!("Relay shutdown complete");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    conn_id: String,
    ctx: Arc<ConnectionContext>,
) {
    debug!("New connection from {}", addr);

    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(ctx.max_frame_bytes);
    ws_config.max_frame_size = Some(ctx.max_frame_bytes);

    let ws_stream = match accept_async_with_config(stream, Some(ws_config)).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            ctx.connections.write().await.remove(&conn_id);
            return;
        }
    };

    info!("Connection {} established from {}", conn_id, addr);

    let (mut sink, mut source) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let handle = ConnectionHandle::new(conn_id.clone(), tx);

    let writer_id = conn_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!("Write to {} failed: {}", writer_id, e);
                break;
            }
        }
        sink.close().await.ok();
    });

    loop {
        tokio::select! {
            msg = source.next() => {
                let Some(msg) = msg else { break };
                match msg {
                    Ok(Message::Text(text)) => {
                        match handle_frame(&ctx.registry, ctx.identity.as_ref(), &handle, &text).await {
                            Ok(FrameOutcome::Registered { username, notified }) => {
                                debug!("{} registered as {} ({} notified)", conn_id, username, notified);
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Dropping frame from {}: {}", conn_id, e),
                        }
                    }
                    Ok(Message::Binary(data)) => {
                        warn!("Dropping {} byte binary frame from {}", data.len(), conn_id);
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // tungstenite queues the pong reply itself
                    }
                    Ok(Message::Close(_)) => {
                        debug!("Connection {} closing", conn_id);
                        break;
                    }
                    Ok(Message::Frame(_)) => {}
                    Err(e) => {
                        warn!("Connection {} error: {}", conn_id, e);
                        break;
                    }
                }
            }
            _ = ctx.shutdown.cancelled() => {
                debug!("Closing connection {} for shutdown", conn_id);
                break;
            }
        }
    }

    ctx.registry.deregister(&conn_id).await;
    drop(handle);
    if tokio::time::timeout(Duration::from_millis(500), writer).await.is_err() {
        debug!("Writer for {} did not drain in time", conn_id);
    }
    ctx.connections.write().await.remove(&conn_id);
    info!("Connection {} closed", conn_id);
}
