// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

/// Failures while handling one inbound relay frame
///
/// None of these close the connection; the frame is logged and dropped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RelayError {
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    #[error("Registration ignored: username and public key must be non-empty")]
    EmptyIdentity,

    #[error("Unsupported frame kind: {kind}")]
    UnsupportedFrame { kind: String },
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::MalformedFrame {
            reason: err.to_string(),
        }
    }
}
