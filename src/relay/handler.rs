// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inbound frame dispatch
//!
//! Parses one text frame from a connection and applies it to the registry.
//! Transport-free, so the whole protocol can be driven from tests without a
//! socket.

use tracing::{debug, info};

use super::{ClientMessage, ConnectionHandle, IdentityProvider, Registry, RelayError, ServerMessage};

/// Sender name used when a `send` frame omits `from`
pub const UNKNOWN_SENDER: &str = "unknown";

/// What a successfully handled frame did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Registered { username: String, notified: usize },
    Listed { entries: usize },
    Routed { delivered: usize, requested: usize },
}

/// Parse `text` and apply it on behalf of `connection`
///
/// # Errors
///
/// - `RelayError::MalformedFrame` for invalid JSON, an unknown `type`, or
///   missing fields
/// - `RelayError::EmptyIdentity` for a registration the provider refuses
///
/// The caller logs the error and keeps the connection open.
pub async fn handle_frame(
    registry: &Registry,
    identity: &dyn IdentityProvider,
    connection: &ConnectionHandle,
    text: &str,
) -> Result<FrameOutcome, RelayError> {
    let message: ClientMessage = serde_json::from_str(text)?;

    match message {
        ClientMessage::Register {
            username,
            public_key,
        } => {
            let identity = identity.resolve(&username, &public_key)?;
            let username = identity.username.clone();
            let notified = registry.register(connection, identity).await;
            Ok(FrameOutcome::Registered { username, notified })
        }

        ClientMessage::List => {
            let list = registry.snapshot().await;
            let entries = list.len();
            connection.send(ServerMessage::Userlist { list }.to_frame());
            debug!("Directory ({} entries) sent to {}", entries, connection.id());
            Ok(FrameOutcome::Listed { entries })
        }

        ClientMessage::Send { from, to, payload } => {
            let from = from.unwrap_or_else(|| UNKNOWN_SENDER.to_string());
            let delivered = registry.route(&from, &to, &payload).await;
            info!(
                "📨 Routed message from {}: {}/{} delivered",
                from,
                delivered,
                to.len()
            );
            Ok(FrameOutcome::Routed {
                delivered,
                requested: to.len(),
            })
        }
    }
}
