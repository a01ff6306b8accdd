// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crypto Error Types
//!
//! Every failure of the client-side crypto pipeline maps onto one of these
//! variants. None of them is fatal to a session: callers contain them at the
//! smallest scope that produced them (one peer, one recipient, one message).
//!
//! ## Error Variants
//!
//! - **KeyFormat**: a published public key could not be parsed as SPKI
//! - **UnknownPeer**: a key was requested for a name absent from the directory
//! - **Decryption**: tag mismatch, malformed envelope, or non-UTF-8 plaintext
//! - **Encryption**: the AEAD refused to seal (only on absurd input sizes)

use thiserror::Error;

/// Error type for identity, key agreement, and envelope operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Public key bytes are not a valid P-256 SubjectPublicKeyInfo
    #[error("Invalid public key format: {reason}")]
    KeyFormat {
        /// Specific failure reason
        reason: String,
    },

    /// No published public key for this peer
    #[error("Unknown peer: {username}")]
    UnknownPeer {
        /// Peer the key was requested for
        username: String,
    },

    /// Authenticated decryption or envelope parsing failed
    #[error("Decryption failed: {reason}")]
    Decryption {
        /// Specific failure reason
        reason: String,
    },

    /// Authenticated encryption failed
    #[error("Encryption failed: {reason}")]
    Encryption {
        /// Specific failure reason
        reason: String,
    },
}

impl CryptoError {
    pub(crate) fn key_format(reason: impl Into<String>) -> Self {
        CryptoError::KeyFormat {
            reason: reason.into(),
        }
    }

    pub(crate) fn decryption(reason: impl Into<String>) -> Self {
        CryptoError::Decryption {
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_peer(username: impl Into<String>) -> Self {
        CryptoError::UnknownPeer {
            username: username.into(),
        }
    }
}

impl From<base64::DecodeError> for CryptoError {
    fn from(err: base64::DecodeError) -> Self {
        CryptoError::KeyFormat {
            reason: format!("base64 decode error: {}", err),
        }
    }
}
