// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client-side chat session: directory, selection, per-recipient encryption
//! and display classification.

pub mod controller;
pub mod error;
pub mod scope;

pub use controller::{
    DirectoryUpdate, DisplayMessage, OutgoingBatch, OutgoingFrame, SendFailure, SessionController,
    SessionEvent, UNDECRYPTABLE_PLACEHOLDER,
};
pub use error::SessionError;
pub use scope::{classify, ConversationScope, ScopeContext, ScopeMode};
