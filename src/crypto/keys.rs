// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Session Identity Key Material
//!
//! Generates the per-session P-256 key pair and converts public keys to and
//! from DER SubjectPublicKeyInfo, the encoding Web Crypto uses for
//! `exportKey("spki", …)`. The wire carries the DER bytes as standard base64.
//!
//! The private half never leaves this struct: it has no serializer and is
//! redacted from `Debug` output.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use p256::{
    pkcs8::{DecodePublicKey, EncodePublicKey},
    PublicKey, SecretKey,
};
use rand::rngs::OsRng;

use super::CryptoError;

/// Per-session ECDH key pair
///
/// Generated once when the client starts; never persisted.
#[derive(Clone)]
pub struct SessionKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl std::fmt::Debug for SessionKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeyPair")
            .field("public", &export_public_base64(&self.public).unwrap_or_default())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionKeyPair {
    /// Generate a fresh key pair from OS entropy
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    /// Public half, safe to publish
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Private half, only used for local key agreement
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    /// SPKI DER bytes of the public half
    pub fn export_public(&self) -> Result<Vec<u8>, CryptoError> {
        export_public(&self.public)
    }

    /// SPKI DER bytes of the public half, base64 encoded for the wire
    pub fn export_public_base64(&self) -> Result<String, CryptoError> {
        export_public_base64(&self.public)
    }
}

/// Serialize a public key as DER SubjectPublicKeyInfo
pub fn export_public(key: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    let document = key
        .to_public_key_der()
        .map_err(|e| CryptoError::key_format(format!("SPKI encoding failed: {}", e)))?;
    Ok(document.as_bytes().to_vec())
}

/// Serialize a public key as base64 SPKI
pub fn export_public_base64(key: &PublicKey) -> Result<String, CryptoError> {
    Ok(BASE64.encode(export_public(key)?))
}

/// Parse DER SubjectPublicKeyInfo bytes into a P-256 public key
///
/// # Errors
///
/// Returns `CryptoError::KeyFormat` if the bytes are not a valid SPKI
/// structure, carry a different algorithm/curve, or encode a point that is
/// not on the curve.
pub fn import_public(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    if bytes.is_empty() {
        return Err(CryptoError::key_format("public key is empty"));
    }

    PublicKey::from_public_key_der(bytes)
        .map_err(|e| CryptoError::key_format(format!("not a P-256 SPKI key: {}", e)))
}

/// Parse a base64 SPKI string as published in the relay directory
pub fn import_public_base64(encoded: &str) -> Result<PublicKey, CryptoError> {
    let bytes = BASE64.decode(encoded.trim())?;
    import_public(&bytes)
}
