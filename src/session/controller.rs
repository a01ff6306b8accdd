// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client Session Controller
//!
//! Owns everything a chat client knows: its own identity, the peer directory
//! last published by the relay, the currently selected peer, and the cache of
//! derived pairwise keys. It turns outgoing text into one encrypted `send`
//! frame per recipient and incoming `message` frames into displayable text.
//!
//! Nothing here touches a socket. The caller ships `OutgoingBatch::frames`
//! and feeds every received `ServerMessage` back in.
//!
//! ## Failure containment
//!
//! - A malformed key in the directory skips that one peer
//! - A failed derivation or encryption skips that one recipient
//! - A failed decryption renders a placeholder for that one message

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::relay::DEFAULT_MAX_FRAME_BYTES;
use crate::crypto::{
    derive_for_peer, encrypt, import_public_base64, open_payload, CryptoError, Envelope,
    PairwiseKey, PairwiseKeyCache, SessionKeyPair,
};
use crate::relay::{ClientMessage, DirectoryEntry, ServerMessage};

use super::{classify, ConversationScope, ScopeContext, ScopeMode, SessionError};

/// Text shown in place of a message that could not be decrypted
pub const UNDECRYPTABLE_PLACEHOLDER: &str = "[undecryptable message]";

/// A message ready for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    pub from: String,
    pub text: String,
    pub scope: ConversationScope,
    /// Sent by this session (local echo or a copy relayed back)
    pub is_self: bool,
    /// False when `text` is the placeholder
    pub decrypted: bool,
}

/// Result of applying a directory update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryUpdate {
    /// Reachable peers, excluding self, sorted
    pub peers: Vec<String>,
    /// Peers whose published key could not be parsed
    pub skipped: Vec<String>,
    /// Selection that was cleared because the peer left
    pub cleared_selection: Option<String>,
}

/// One `send` frame addressed to a single recipient
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingFrame {
    pub recipient: String,
    pub message: ClientMessage,
}

/// A recipient that could not be encrypted for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendFailure {
    pub recipient: String,
    pub error: CryptoError,
}

/// Everything produced by sending one message
#[derive(Debug, Clone)]
pub struct OutgoingBatch {
    pub frames: Vec<OutgoingFrame>,
    pub failures: Vec<SendFailure>,
    pub echo: DisplayMessage,
}

/// What a received server frame meant for the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Directory(DirectoryUpdate),
    Message(DisplayMessage),
}

pub struct SessionController {
    username: String,
    keys: SessionKeyPair,
    public_key: String,
    scope_mode: ScopeMode,
    max_frame_bytes: usize,
    directory: HashMap<String, String>,
    online: usize,
    selected: Option<String>,
    cache: PairwiseKeyCache,
}

impl SessionController {
    /// Controller for `username`, trimmed of surrounding whitespace
    ///
    /// # Errors
    ///
    /// `SessionError::EmptyUsername` if nothing is left after trimming.
    pub fn new(
        username: impl Into<String>,
        keys: SessionKeyPair,
        scope_mode: ScopeMode,
    ) -> Result<Self, SessionError> {
        let username = username.into().trim().to_string();
        if username.is_empty() {
            return Err(SessionError::EmptyUsername);
        }

        let public_key = keys.export_public_base64()?;
        Ok(Self {
            username,
            keys,
            public_key,
            scope_mode,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            directory: HashMap::new(),
            online: 0,
            selected: None,
            cache: PairwiseKeyCache::new(),
        })
    }

    /// Controller with a freshly generated identity
    pub fn generate(username: impl Into<String>, scope_mode: ScopeMode) -> Result<Self, SessionError> {
        Self::new(username, SessionKeyPair::generate(), scope_mode)
    }

    /// Largest `send` frame this session will produce; match the relay's limit
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Own base64 SPKI public key as published to the relay
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn scope_mode(&self) -> ScopeMode {
        self.scope_mode
    }

    pub fn max_frame_bytes(&self) -> usize {
        self.max_frame_bytes
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Number of identities online at the last directory update
    pub fn online(&self) -> usize {
        self.online
    }

    /// Reachable peers, excluding self, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self
            .directory
            .keys()
            .filter(|name| **name != self.username)
            .cloned()
            .collect();
        peers.sort();
        peers
    }

    pub fn register_message(&self) -> ClientMessage {
        ClientMessage::Register {
            username: self.username.clone(),
            public_key: self.public_key.clone(),
        }
    }

    pub fn list_message(&self) -> ClientMessage {
        ClientMessage::List
    }

    /// Replace the peer directory with `list`
    ///
    /// Entries with unparseable keys are skipped. Cached keys for peers that
    /// left or published a new key are invalidated. A selection pointing at a
    /// peer that is no longer reachable is cleared, falling back to broadcast.
    pub async fn apply_directory(&mut self, list: &[DirectoryEntry]) -> DirectoryUpdate {
        let mut directory = HashMap::with_capacity(list.len());
        let mut skipped = Vec::new();

        for entry in list {
            match import_public_base64(&entry.public_key) {
                Ok(_) => {
                    directory.insert(entry.username.clone(), entry.public_key.clone());
                }
                Err(e) => {
                    warn!("Skipping {} in directory: {}", entry.username, e);
                    skipped.push(entry.username.clone());
                }
            }
        }

        self.cache.retain_directory(&directory).await;
        self.directory = directory;
        self.online = list.len();

        let dangling = self
            .selected
            .as_ref()
            .is_some_and(|name| !self.directory.contains_key(name));
        let cleared_selection = if dangling {
            let name = self.selected.take();
            info!("Selected peer {:?} left, back to broadcast", name);
            name
        } else {
            None
        };

        DirectoryUpdate {
            peers: self.peers(),
            skipped,
            cleared_selection,
        }
    }

    /// Select `username` as the single recipient of future sends
    pub fn select(&mut self, username: &str) -> Result<(), SessionError> {
        if username == self.username || !self.directory.contains_key(username) {
            return Err(SessionError::UnknownPeer {
                username: username.to_string(),
            });
        }
        self.selected = Some(username.to_string());
        Ok(())
    }

    /// Select `username`, or clear the selection if it is already selected
    ///
    /// Returns the selection after the toggle.
    pub fn toggle_selection(&mut self, username: &str) -> Result<Option<String>, SessionError> {
        if self.selected.as_deref() == Some(username) {
            self.selected = None;
        } else {
            self.select(username)?;
        }
        Ok(self.selected.clone())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Pairwise key with `username`, derived once and cached
    pub async fn pairwise_key(&self, username: &str) -> Result<PairwiseKey, CryptoError> {
        let published = self
            .directory
            .get(username)
            .ok_or_else(|| CryptoError::UnknownPeer {
                username: username.to_string(),
            })?;

        if let Some(key) = self.cache.get_key(username, published).await {
            return Ok(key);
        }

        let key = derive_for_peer(self.keys.secret_key(), &self.directory, username)?;
        self.cache.store_key(username, published, key.clone()).await;
        Ok(key)
    }

    /// Encrypt `text` once per recipient
    ///
    /// Recipients are the selected peer, or every other online peer when
    /// nothing is selected. Whitespace-only text yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// - `SessionError::NoRecipients` when there is nobody to send to
    /// - `SessionError::MessageTooLarge` when an encoded frame would exceed
    ///   `max_frame_bytes`, since the relay drops connections that send one
    ///
    /// No frame is produced in either case. Per-recipient crypto failures are
    /// reported in `OutgoingBatch::failures` instead.
    pub async fn prepare_send(&self, text: &str) -> Result<Option<OutgoingBatch>, SessionError> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        let (recipients, private) = match &self.selected {
            Some(name) => (vec![name.clone()], true),
            None => (self.peers(), false),
        };

        if recipients.is_empty() {
            return Err(SessionError::NoRecipients);
        }

        let mut frames = Vec::with_capacity(recipients.len());
        let mut failures = Vec::new();

        for recipient in recipients {
            match self.seal_for(&recipient, text, private).await {
                Ok(envelope) => {
                    let message = ClientMessage::Send {
                        from: Some(self.username.clone()),
                        to: vec![recipient.clone()],
                        payload: envelope.to_json(),
                    };
                    let size = message.to_frame().len();
                    if size > self.max_frame_bytes {
                        warn!(
                            "❌ Frame for {} is {} bytes, limit is {}",
                            recipient, size, self.max_frame_bytes
                        );
                        return Err(SessionError::MessageTooLarge {
                            size,
                            max: self.max_frame_bytes,
                        });
                    }
                    frames.push(OutgoingFrame { recipient, message });
                }
                Err(error) => {
                    warn!("Could not encrypt for {}: {}", recipient, error);
                    failures.push(SendFailure { recipient, error });
                }
            }
        }

        debug!(
            "Prepared {} frame(s), {} failure(s)",
            frames.len(),
            failures.len()
        );

        Ok(Some(OutgoingBatch {
            frames,
            failures,
            echo: DisplayMessage {
                from: self.username.clone(),
                text: text.to_string(),
                scope: ConversationScope::from_private(private),
                is_self: true,
                decrypted: true,
            },
        }))
    }

    async fn seal_for(
        &self,
        recipient: &str,
        text: &str,
        private: bool,
    ) -> Result<Envelope, CryptoError> {
        let key = self.pairwise_key(recipient).await?;
        encrypt(&key, text, Some(private))
    }

    /// Decrypt and classify a forwarded payload
    ///
    /// Never fails: an unknown sender or a bad envelope yields the placeholder.
    pub async fn receive(&self, from: &str, payload: &str) -> DisplayMessage {
        let opened = match self.pairwise_key(from).await {
            Ok(key) => open_payload(&key, payload),
            Err(e) => Err(e),
        };

        let (text, private_flag, decrypted) = match opened {
            Ok((text, flag)) => (text, flag, true),
            Err(e) => {
                warn!("Could not decrypt message from {}: {}", from, e);
                let flag = Envelope::from_json(payload)
                    .ok()
                    .and_then(|envelope| envelope.private_flag);
                (UNDECRYPTABLE_PLACEHOLDER.to_string(), flag, false)
            }
        };

        let scope = classify(
            self.scope_mode,
            &ScopeContext {
                private_flag,
                sender: from,
                local_username: &self.username,
                online: self.online,
                has_selection: self.selected.is_some(),
            },
        );

        DisplayMessage {
            from: from.to_string(),
            text,
            scope,
            is_self: from == self.username,
            decrypted,
        }
    }

    /// Apply any frame received from the relay
    pub async fn handle_server_message(&mut self, message: ServerMessage) -> SessionEvent {
        match message {
            ServerMessage::Userlist { list } => {
                SessionEvent::Directory(self.apply_directory(&list).await)
            }
            ServerMessage::Message { from, payload } => {
                SessionEvent::Message(self.receive(&from, &payload).await)
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("username", &self.username)
            .field("scope_mode", &self.scope_mode)
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("online", &self.online)
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}
