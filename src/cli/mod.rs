// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod chat;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::relay::DEFAULT_MAX_FRAME_BYTES;
use crate::config::{ClientConfig, RelayConfig};
use crate::session::ScopeMode;

/// End-to-end encrypted chat relay
#[derive(Parser, Debug)]
#[command(name = "cipher-relay")]
#[command(version)]
#[command(about = "WebSocket relay for end-to-end encrypted chat", long_about = None)]
pub struct RelayCli {
    /// TOML file with a [relay] table
    #[arg(long, env = "RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Maximum simultaneous connections
    #[arg(long)]
    pub max_connections: Option<usize>,

    /// Maximum size of one inbound frame in bytes
    #[arg(long)]
    pub max_frame_bytes: Option<usize>,
}

impl RelayCli {
    /// Flags override the environment, which overrides the config file
    pub fn resolve(&self) -> Result<RelayConfig> {
        let mut config = match &self.config {
            Some(path) => RelayConfig::from_file(path)?.merge_env()?,
            None => RelayConfig::from_env()?,
        };

        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(max) = self.max_connections {
            config.max_connections = max;
        }
        if let Some(max) = self.max_frame_bytes {
            config.max_frame_bytes = max;
        }
        Ok(config)
    }
}

/// Terminal client for the encrypted relay chat
#[derive(Parser, Debug)]
#[command(name = "relay-chat")]
#[command(version)]
#[command(about = "Line-oriented end-to-end encrypted chat client", long_about = None)]
pub struct ChatCli {
    /// Relay WebSocket URL
    #[arg(long, env = "RELAY_URL", default_value = "ws://127.0.0.1:3000")]
    pub url: String,

    /// Name to register under
    #[arg(long, env = "CHAT_USERNAME", value_parser = parse_username)]
    pub username: String,

    /// How received messages are classified as private or group
    #[arg(long, value_enum, default_value_t = ScopeMode::ExplicitFlag)]
    pub scope_mode: ScopeMode,

    /// Refuse to send frames larger than this; keep in step with the relay
    #[arg(long, env = "RELAY_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    pub max_frame_bytes: usize,
}

impl ChatCli {
    pub fn into_config(self) -> ClientConfig {
        ClientConfig::new(self.url, self.username)
            .with_scope_mode(self.scope_mode)
            .with_max_frame_bytes(self.max_frame_bytes)
    }
}

fn parse_username(value: &str) -> Result<String, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("username must not be empty".to_string());
    }
    Ok(trimmed.to_string())
}
