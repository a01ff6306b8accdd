// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! WebSocket relay
//!
//! Keeps the directory of online identities and forwards opaque payloads
//! between them. Independent of the crypto module: payloads and public keys
//! are plain strings here.

pub mod error;
pub mod handler;
pub mod identity;
pub mod messages;
pub mod registry;
pub mod server;

pub use error::RelayError;
pub use handler::{handle_frame, FrameOutcome, UNKNOWN_SENDER};
pub use identity::{Identity, IdentityProvider, SelfAsserted};
pub use messages::{ClientMessage, DirectoryEntry, ServerMessage};
pub use registry::{ConnectionHandle, ConnectionId, Registry};
pub use server::{RelayServer, ServerHandle};
