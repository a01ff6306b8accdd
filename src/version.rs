// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the cipher relay

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Wire protocol features understood by this build
pub const FEATURES: &[&str] = &[
    "p256-ecdh",
    "spki-public-keys",
    "aes-256-gcm",
    "per-recipient-envelopes",
    "private-flag",
    "last-write-wins-registration",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("cipher-relay {}", VERSION_NUMBER)
}
