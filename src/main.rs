// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use cipher_relay::{cli::RelayCli, relay::RelayServer, version};
use clap::Parser;
use std::env;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    println!("🚀 Starting {}...", version::get_version_string());
    println!("🔐 Features: {}", version::FEATURES.join(", "));

    let cli = RelayCli::parse();
    let config = cli.resolve()?;
    println!("📡 Binding {}", config.bind_address());

    let server = RelayServer::new(config);
    let handle = server.start().await?;
    println!("✅ Relay ready at {}", handle.ws_url());
    println!("\nPress Ctrl+C to shutdown...");

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    println!("\n🛑 Shutting down...");

    handle.shutdown().await?;
    Ok(())
}
