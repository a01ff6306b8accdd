// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Relay Registry & Router
//!
//! Tracks who is online (username, public key, outbound channel) and forwards
//! opaque payloads between them. The registry never looks inside a payload.
//!
//! All mutations and the directory snapshot they broadcast happen under one
//! async mutex, so the sequence of broadcast directories is a linearizable
//! history of registrations and departures. Forwarding is a non-blocking
//! channel push, so holding the lock never waits on a slow peer.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::{DirectoryEntry, Identity, ServerMessage};

/// Opaque per-connection identifier
pub type ConnectionId = String;

/// Outbound side of one connection
///
/// Frames pushed here are written to the socket by the connection's writer
/// task. Cloning is cheap; the channel closes once the writer exits.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new(id: impl Into<ConnectionId>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self { id: id.into(), tx }
    }

    /// Create a handle with a fresh `conn-<uuid>` id and its receiving end
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = format!("conn-{}", uuid::Uuid::new_v4());
        (Self { id, tx }, rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame; false if the peer is already gone
    pub fn send(&self, frame: String) -> bool {
        self.tx.send(frame).is_ok()
    }
}

struct RegistryEntry {
    connection: ConnectionHandle,
    public_key: String,
}

/// Online identities keyed by username
pub struct Registry {
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Upsert `identity` for `connection` and broadcast the new directory
    ///
    /// Last write wins: a second registration under the same name takes the
    /// name over. If this connection previously held a different name, that
    /// stale entry is dropped. Returns how many peers received the broadcast.
    pub async fn register(&self, connection: &ConnectionHandle, identity: Identity) -> usize {
        let mut entries = self.entries.lock().await;

        entries.retain(|name, entry| {
            entry.connection.id != connection.id || *name == identity.username
        });

        if let Some(previous) = entries.insert(
            identity.username.clone(),
            RegistryEntry {
                connection: connection.clone(),
                public_key: identity.public_key,
            },
        ) {
            if previous.connection.id != connection.id {
                info!(
                    "👤 Username {} taken over by {} (was {})",
                    identity.username, connection.id, previous.connection.id
                );
            }
        }

        info!(
            "👤 Registered {} on {} (online: {})",
            identity.username,
            connection.id,
            entries.len()
        );

        broadcast_locked(&entries)
    }

    /// Remove whatever entry `connection` owns and broadcast if one was removed
    ///
    /// Lookup is by connection, never by claimed name, so a connection that
    /// lost its name to a later registration cannot evict the new owner.
    pub async fn deregister(&self, connection_id: &str) -> bool {
        let mut entries = self.entries.lock().await;

        let owned: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.connection.id == connection_id)
            .map(|(name, _)| name.clone())
            .collect();

        if owned.is_empty() {
            return false;
        }

        for name in &owned {
            entries.remove(name);
            info!(
                "👋 {} left ({}) (online: {})",
                name,
                connection_id,
                entries.len()
            );
        }

        broadcast_locked(&entries);
        true
    }

    /// Forward `payload` from `from` to every named recipient that is online
    ///
    /// Absent or closed recipients are skipped silently. The returned count is
    /// for logging; the sender is never told about drops.
    pub async fn route(&self, from: &str, to: &[String], payload: &str) -> usize {
        let entries = self.entries.lock().await;
        let frame = ServerMessage::Message {
            from: from.to_string(),
            payload: payload.to_string(),
        }
        .to_frame();

        let mut delivered = 0;
        for recipient in to {
            match entries.get(recipient) {
                Some(entry) if entry.connection.is_open() => {
                    if entry.connection.send(frame.clone()) {
                        delivered += 1;
                    }
                }
                _ => debug!("Dropping message from {} for offline {}", from, recipient),
            }
        }
        delivered
    }

    /// Current directory, sorted by username
    pub async fn snapshot(&self) -> Vec<DirectoryEntry> {
        let entries = self.entries.lock().await;
        snapshot_locked(&entries)
    }

    /// Number of registered identities
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_locked(entries: &HashMap<String, RegistryEntry>) -> Vec<DirectoryEntry> {
    let mut list: Vec<DirectoryEntry> = entries
        .iter()
        .map(|(name, entry)| DirectoryEntry::new(name.clone(), entry.public_key.clone()))
        .collect();
    list.sort_by(|a, b| a.username.cmp(&b.username));
    list
}

fn broadcast_locked(entries: &HashMap<String, RegistryEntry>) -> usize {
    let frame = ServerMessage::Userlist {
        list: snapshot_locked(entries),
    }
    .to_frame();

    entries
        .values()
        .filter(|entry| entry.connection.send(frame.clone()))
        .count()
}
