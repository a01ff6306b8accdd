// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Deserializer, Serialize};

/// One online identity as published in the directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub username: String,
    /// Base64 SPKI public key, opaque to the relay
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

impl DirectoryEntry {
    pub fn new(username: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            public_key: public_key.into(),
        }
    }
}

/// Frames a client sends to the relay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Claim a username and publish a public key
    Register {
        username: String,
        #[serde(rename = "publicKey")]
        public_key: String,
    },

    /// Ask for the current directory (answered to the requester only)
    List,

    /// Forward an opaque payload to each named recipient
    Send {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<String>,
        #[serde(default, deserialize_with = "recipients_or_empty")]
        to: Vec<String>,
        payload: String,
    },
}

/// Frames the relay sends to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full directory of online identities
    Userlist { list: Vec<DirectoryEntry> },

    /// A payload forwarded verbatim from `from`
    Message { from: String, payload: String },
}

impl ServerMessage {
    /// Encode as a JSON text frame
    pub fn to_frame(&self) -> String {
        // Only strings and vectors of strings: serialization cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ClientMessage {
    /// Encode as a JSON text frame
    pub fn to_frame(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// A `to` that is not an array routes nowhere; non-string items are skipped
fn recipients_or_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}
