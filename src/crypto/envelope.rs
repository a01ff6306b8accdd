// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Message Envelope Codec
//!
//! Seals one chat message for one recipient with AES-256-GCM, following the
//! Web Crypto API conventions so browser peers can open the same envelopes.
//!
//! **Wire Format** (JSON string carried as the relay `payload`):
//! ```text
//! {"iv": "<base64 12 bytes>", "data": "<base64 ciphertext+tag>", "private": true}
//! ```
//!
//! - Nonce: 12 bytes, fresh from OS entropy per envelope
//! - Ciphertext+Tag: encrypted UTF-8 text plus the 16-byte authentication tag
//! - No Additional Authenticated Data (AAD)
//! - `nonce` is accepted in place of `iv`; `private` may be absent

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{CryptoError, PairwiseKey};

/// AES-GCM nonce length in bytes
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes
pub const TAG_LEN: usize = 16;

/// One encrypted message addressed to one recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    /// Sender's view of the message scope; `None` for legacy senders
    pub private_flag: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EnvelopeWire {
    #[serde(alias = "nonce")]
    iv: String,
    data: String,
    #[serde(default, rename = "private", skip_serializing_if = "Option::is_none")]
    private_flag: Option<bool>,
}

impl Envelope {
    /// Serialize to the JSON string carried as the relay payload
    pub fn to_json(&self) -> String {
        let wire = EnvelopeWire {
            iv: BASE64.encode(self.nonce),
            data: BASE64.encode(&self.ciphertext),
            private_flag: self.private_flag,
        };
        // Only string and bool fields: serialization cannot fail
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Parse a relay payload back into an envelope
    ///
    /// # Errors
    ///
    /// `CryptoError::Decryption` if the payload is not envelope JSON, a field
    /// is not base64, or the nonce is not exactly 12 bytes.
    pub fn from_json(payload: &str) -> Result<Self, CryptoError> {
        let wire: EnvelopeWire = serde_json::from_str(payload)
            .map_err(|e| CryptoError::decryption(format!("malformed envelope: {}", e)))?;

        let nonce_bytes = BASE64
            .decode(&wire.iv)
            .map_err(|e| CryptoError::decryption(format!("nonce is not base64: {}", e)))?;
        let nonce: [u8; NONCE_LEN] = nonce_bytes.as_slice().try_into().map_err(|_| {
            CryptoError::decryption(format!(
                "invalid nonce size: expected {} bytes, got {}",
                NONCE_LEN,
                nonce_bytes.len()
            ))
        })?;

        let ciphertext = BASE64
            .decode(&wire.data)
            .map_err(|e| CryptoError::decryption(format!("ciphertext is not base64: {}", e)))?;

        Ok(Self {
            nonce,
            ciphertext,
            private_flag: wire.private_flag,
        })
    }
}

/// Encrypt `plaintext` for the holder of `key`
///
/// A fresh random nonce is drawn on every call, so encrypting the same text
/// twice never yields the same envelope.
pub fn encrypt(
    key: &PairwiseKey,
    plaintext: &str,
    private_flag: Option<bool>,
) -> Result<Envelope, CryptoError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|e| CryptoError::Encryption {
        reason: format!("failed to create AES-GCM cipher: {}", e),
    })?;

    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(
            &Nonce::from(nonce),
            Payload {
                msg: plaintext.as_bytes(),
                aad: b"",
            },
        )
        .map_err(|e| CryptoError::Encryption {
            reason: format!("AES-GCM encryption failed: {}", e),
        })?;

    Ok(Envelope {
        nonce,
        ciphertext,
        private_flag,
    })
}

/// Open an envelope with `key` and return the UTF-8 plaintext
///
/// # Errors
///
/// `CryptoError::Decryption` on a wrong key, any modified nonce or ciphertext
/// bit, a truncated ciphertext, or plaintext that is not valid UTF-8.
pub fn decrypt(key: &PairwiseKey, envelope: &Envelope) -> Result<String, CryptoError> {
    if envelope.ciphertext.len() < TAG_LEN {
        return Err(CryptoError::decryption(format!(
            "ciphertext too short: expected at least {} bytes, got {}",
            TAG_LEN,
            envelope.ciphertext.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::decryption(format!("failed to create AES-GCM cipher: {}", e)))?;

    let plaintext_bytes = cipher
        .decrypt(
            &Nonce::from(envelope.nonce),
            Payload {
                msg: &envelope.ciphertext,
                aad: b"",
            },
        )
        .map_err(|_| {
            CryptoError::decryption("authentication failed (wrong key or corrupted data)")
        })?;

    String::from_utf8(plaintext_bytes)
        .map_err(|e| CryptoError::decryption(format!("plaintext is not valid UTF-8: {}", e)))
}

/// Parse and open a relay payload in one step, returning text and flag
pub fn open_payload(
    key: &PairwiseKey,
    payload: &str,
) -> Result<(String, Option<bool>), CryptoError> {
    let envelope = Envelope::from_json(payload)?;
    let plaintext = decrypt(key, &envelope)?;
    Ok((plaintext, envelope.private_flag))
}
