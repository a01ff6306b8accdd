// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ConfigError;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;
/// Envelopes are small; 64 KiB leaves room for long messages
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Relay server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub max_connections: usize,
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RelayConfigFile {
    #[serde(default)]
    relay: RelayConfig,
}

impl RelayConfig {
    /// Load the `[relay]` table from a TOML file; missing keys keep defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let file: RelayConfigFile =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;

        Ok(file.relay)
    }

    /// Defaults overridden by `RELAY_HOST`, `PORT`, `RELAY_MAX_CONNECTIONS`
    /// and `RELAY_MAX_FRAME_BYTES`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().merge_env()
    }

    /// Apply environment overrides on top of `self`
    pub fn merge_env(mut self) -> Result<Self, ConfigError> {
        if let Ok(val) = std::env::var("RELAY_HOST") {
            self.host = val;
        }
        if let Some(port) = parse_env("PORT")? {
            self.port = port;
        }
        if let Some(max) = parse_env("RELAY_MAX_CONNECTIONS")? {
            self.max_connections = max;
        }
        if let Some(max) = parse_env("RELAY_MAX_FRAME_BYTES")? {
            self.max_frame_bytes = max;
        }
        Ok(self)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value,
            }),
        Err(_) => Ok(None),
    }
}
