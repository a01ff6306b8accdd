// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ECDH Pairwise Key Derivation
//!
//! Elliptic Curve Diffie-Hellman on P-256 between the local session secret and
//! a peer's published public key. The resulting 32-byte x-coordinate is used
//! directly as the AES-256-GCM key, which is exactly what Web Crypto's
//! `deriveKey({ name: "ECDH" }, …, { name: "AES-GCM", length: 256 })` does, so
//! keys agree with browser peers.

use std::collections::HashMap;

use p256::{PublicKey, SecretKey};

use super::{keys::import_public_base64, CryptoError};

/// 256-bit symmetric key shared by exactly two identities
#[derive(Clone, PartialEq, Eq)]
pub struct PairwiseKey([u8; 32]);

impl std::fmt::Debug for PairwiseKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PairwiseKey([REDACTED])")
    }
}

impl PairwiseKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw key bytes for the AEAD
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Derive the pairwise key for `(local_secret, remote_public)`
///
/// Commutative: `derive_shared_key(a.secret, b.public)` equals
/// `derive_shared_key(b.secret, a.public)`.
pub fn derive_shared_key(local_secret: &SecretKey, remote_public: &PublicKey) -> PairwiseKey {
    let shared_secret =
        p256::ecdh::diffie_hellman(local_secret.to_nonzero_scalar(), remote_public.as_affine());

    let mut key = [0u8; 32];
    key.copy_from_slice(shared_secret.raw_secret_bytes().as_slice());
    PairwiseKey(key)
}

/// Derive the pairwise key for a peer looked up by name
///
/// `directory` maps usernames to base64 SPKI keys as published by the relay.
///
/// # Errors
///
/// - `CryptoError::UnknownPeer` if `username` is not in the directory
/// - `CryptoError::KeyFormat` if the published key cannot be parsed
pub fn derive_for_peer(
    local_secret: &SecretKey,
    directory: &HashMap<String, String>,
    username: &str,
) -> Result<PairwiseKey, CryptoError> {
    let published = directory
        .get(username)
        .ok_or_else(|| CryptoError::unknown_peer(username))?;

    let remote_public = import_public_base64(published)?;
    Ok(derive_shared_key(local_secret, &remote_public))
}
