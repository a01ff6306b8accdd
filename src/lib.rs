// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod cli;
pub mod config;
pub mod crypto;
pub mod relay;
pub mod session;
pub mod version;

// Re-export main types
pub use config::{ClientConfig, ConfigError, RelayConfig};
pub use crypto::{CryptoError, Envelope, PairwiseKey, SessionKeyPair};
pub use relay::{
    ClientMessage, DirectoryEntry, Registry, RelayError, RelayServer, ServerHandle, ServerMessage,
};
pub use session::{ConversationScope, DisplayMessage, ScopeMode, SessionController, SessionError};
