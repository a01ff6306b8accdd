// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line-oriented chat client
//!
//! Reads lines from stdin, drives a [`SessionController`] and prints what it
//! produces. Commands:
//!
//! - `/to <name>`: select a peer for private messages (again to unselect)
//! - `/all`: back to broadcast
//! - `/who`: ask the relay for the current directory
//! - `/quit`: leave
//!
//! Any other line is sent as a message.

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::relay::ServerMessage;
use crate::session::{
    DirectoryUpdate, DisplayMessage, SessionController, SessionError, SessionEvent,
};

/// One parsed line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Select(String),
    All,
    Who,
    Quit,
    Say(String),
    Empty,
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatCommand::Empty;
        }

        match trimmed.split_once(char::is_whitespace) {
            Some(("/to", name)) if !name.trim().is_empty() => {
                ChatCommand::Select(name.trim().to_string())
            }
            _ => match trimmed {
                "/all" => ChatCommand::All,
                "/who" => ChatCommand::Who,
                "/quit" => ChatCommand::Quit,
                _ => ChatCommand::Say(line.trim_end_matches(['\r', '\n']).to_string()),
            },
        }
    }
}

/// Render a message the way the terminal shows it
pub fn render_message(message: &DisplayMessage) -> String {
    let marker = if message.scope.is_private() { "🔒 " } else { "" };
    let sender = if message.is_self { "you" } else { message.from.as_str() };
    format!("{}{}: {}", marker, sender, message.text)
}

pub fn render_directory(update: &DirectoryUpdate, selected: Option<&str>) -> String {
    let peers: Vec<String> = update
        .peers
        .iter()
        .map(|peer| {
            if Some(peer.as_str()) == selected {
                format!("[{}]", peer)
            } else {
                peer.clone()
            }
        })
        .collect();

    let mut line = if peers.is_empty() {
        "👥 online: nobody else".to_string()
    } else {
        format!("👥 online: {}", peers.join(", "))
    };
    if let Some(name) = &update.cleared_selection {
        line.push_str(&format!(" ({} left, sending to everyone)", name));
    }
    line
}

fn mode_line(controller: &SessionController) -> String {
    match controller.selected() {
        Some(name) => format!("✉️  private to {}", name),
        None => "📢 sending to everyone".to_string(),
    }
}

/// Connect, register and run until `/quit`, end of input, or relay close
pub async fn run(config: ClientConfig) -> Result<()> {
    let mut controller = SessionController::generate(config.username.as_str(), config.scope_mode)?
        .with_max_frame_bytes(config.max_frame_bytes);

    let (ws_stream, _) = connect_async(config.server_url.as_str())
        .await
        .map_err(|e| anyhow!("Failed to connect to {}: {}", config.server_url, e))?;
    info!("Connected to {} as {}", config.server_url, config.username);

    let (mut sink, mut source) = ws_stream.split();
    sink.send(Message::Text(controller.register_message().to_frame()))
        .await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", mode_line(&controller));

    loop {
        tokio::select! {
            incoming = source.next() => {
                let Some(incoming) = incoming else {
                    println!("relay closed the connection");
                    break;
                };
                match incoming? {
                    Message::Text(text) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => match controller.handle_server_message(message).await {
                            SessionEvent::Directory(update) => {
                                println!("{}", render_directory(&update, controller.selected()));
                            }
                            SessionEvent::Message(message) => println!("{}", render_message(&message)),
                        },
                        Err(e) => warn!("Ignoring unexpected frame: {}", e),
                    },
                    Message::Close(_) => {
                        println!("relay closed the connection");
                        break;
                    }
                    other => debug!("Ignoring frame: {:?}", other),
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match ChatCommand::parse(&line) {
                    ChatCommand::Empty => {}
                    ChatCommand::Quit => break,
                    ChatCommand::Who => {
                        sink.send(Message::Text(controller.list_message().to_frame())).await?;
                    }
                    ChatCommand::All => {
                        controller.clear_selection();
                        println!("{}", mode_line(&controller));
                    }
                    ChatCommand::Select(name) => match controller.toggle_selection(&name) {
                        Ok(_) => println!("{}", mode_line(&controller)),
                        Err(e) => println!("⚠️  {}", e),
                    },
                    ChatCommand::Say(text) => match controller.prepare_send(&text).await {
                        Ok(Some(batch)) => {
                            for frame in batch.frames {
                                sink.send(Message::Text(frame.message.to_frame())).await?;
                            }
                            for failure in &batch.failures {
                                println!("⚠️  not sent to {}: {}", failure.recipient, failure.error);
                            }
                            println!("{}", render_message(&batch.echo));
                        }
                        Ok(None) => {}
                        Err(SessionError::NoRecipients) => println!("⚠️  No other users online"),
                        Err(SessionError::MessageTooLarge { size, max }) => {
                            println!("⚠️  Message not sent: {} bytes encrypted, relay accepts {}", size, max);
                        }
                        Err(e) => println!("⚠️  {}", e),
                    },
                }
            }
        }
    }

    sink.close().await.ok();
    Ok(())
}
