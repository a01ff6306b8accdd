// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Conversation scope classification
//!
//! Decides whether a received message is displayed as private or group.

use serde::{Deserialize, Serialize};

/// How a received message is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationScope {
    Private,
    Group,
}

impl ConversationScope {
    pub fn from_private(private: bool) -> Self {
        if private {
            ConversationScope::Private
        } else {
            ConversationScope::Group
        }
    }

    pub fn is_private(self) -> bool {
        self == ConversationScope::Private
    }
}

impl std::fmt::Display for ConversationScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationScope::Private => write!(f, "private"),
            ConversationScope::Group => write!(f, "group"),
        }
    }
}

/// Which signal decides the scope of a received message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeMode {
    /// Sender's `private` flag when present, directory heuristic otherwise
    #[default]
    ExplicitFlag,
    /// Always use the directory heuristic, ignoring the flag
    DirectorySize,
}

/// Inputs to the classification of one received message
#[derive(Debug, Clone, Copy)]
pub struct ScopeContext<'a> {
    pub private_flag: Option<bool>,
    pub sender: &'a str,
    pub local_username: &'a str,
    pub online: usize,
    pub has_selection: bool,
}

/// Classify one received message
///
/// The directory heuristic: with more than two identities online and a
/// sender other than self, the message is private iff nothing is selected;
/// in every other case it is private.
pub fn classify(mode: ScopeMode, ctx: &ScopeContext<'_>) -> ConversationScope {
    if mode == ScopeMode::ExplicitFlag {
        if let Some(private) = ctx.private_flag {
            return ConversationScope::from_private(private);
        }
    }

    let private = if ctx.online > 2 && ctx.sender != ctx.local_username {
        !ctx.has_selection
    } else {
        true
    };
    ConversationScope::from_private(private)
}
