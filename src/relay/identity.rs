// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Identity Resolution
//!
//! The relay never decides who a user "really" is on its own; it asks an
//! [`IdentityProvider`]. The only shipped provider takes the claimed name at
//! face value, so anyone can register as anyone. A signed-challenge or
//! token-based provider can be dropped in without touching the registry.

use super::RelayError;

/// An online identity as accepted by the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub public_key: String,
}

/// Turns a registration claim into an accepted identity
pub trait IdentityProvider: Send + Sync {
    fn resolve(&self, username: &str, public_key: &str) -> Result<Identity, RelayError>;
}

/// Accepts whatever name the client claims
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfAsserted;

impl IdentityProvider for SelfAsserted {
    fn resolve(&self, username: &str, public_key: &str) -> Result<Identity, RelayError> {
        if username.is_empty() || public_key.is_empty() {
            return Err(RelayError::EmptyIdentity);
        }

        Ok(Identity {
            username: username.to_string(),
            public_key: public_key.to_string(),
        })
    }
}
