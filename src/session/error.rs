// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use crate::crypto::CryptoError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Username is empty after trimming
    #[error("Username must not be empty")]
    EmptyUsername,

    /// Nobody to send to: no selection and no other peer online
    #[error("No other users online")]
    NoRecipients,

    /// Selection target is self or not in the directory
    #[error("Unknown peer: {username}")]
    UnknownPeer { username: String },

    /// An encrypted frame would exceed the relay's frame limit
    #[error("Message too large: {size} bytes exceeds the {max} byte frame limit")]
    MessageTooLarge { size: usize, max: usize },

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
