// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-End Encryption Module
//!
//! Client-side cryptographic primitives for relay chat. The relay never sees
//! any of this: it only forwards the opaque envelope strings produced here.
//!
//! - **Keys**: per-session P-256 key pair, SPKI public key import/export
//! - **ECDH**: pairwise AES-256 key for any (local secret, peer public key)
//! - **Envelope**: AES-256-GCM seal/open with the Web Crypto wire layout
//! - **Key Cache**: per-peer derived keys, invalidated on key change
//!
//! ## Security Considerations
//!
//! - Key pairs are generated per session and never persisted
//! - Nonces are drawn fresh from OS entropy for every envelope
//! - A failed decryption is contained to that one message
//!
//! ## Protocol Flow
//!
//! 1. Client generates a key pair and publishes the SPKI public key
//! 2. For each recipient, client derives the pairwise key via ECDH
//! 3. Client encrypts the message once per recipient
//! 4. Recipient derives the same key from the stated sender's published key
//! 5. Recipient decrypts and verifies the authentication tag

pub mod ecdh;
pub mod envelope;
pub mod error;
pub mod key_cache;
pub mod keys;

pub use ecdh::{derive_for_peer, derive_shared_key, PairwiseKey};
pub use envelope::{decrypt, encrypt, open_payload, Envelope};
pub use error::CryptoError;
pub use key_cache::PairwiseKeyCache;
pub use keys::{
    export_public, export_public_base64, import_public, import_public_base64, SessionKeyPair,
};
