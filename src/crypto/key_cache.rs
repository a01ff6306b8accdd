// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Pairwise Key Cache
//!
//! Caches derived pairwise keys per peer for the lifetime of a session so a
//! fan-out to N peers does N scalar multiplications once, not once per message.
//!
//! Each entry remembers the published key it was derived from. A lookup with
//! a different published key misses, and `retain_directory` drops entries for
//! peers that left or rotated their key.
//!
//! **Security**: Keys are stored in memory only and never persisted to disk.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::PairwiseKey;

#[derive(Clone)]
struct CachedKey {
    published: String,
    key: PairwiseKey,
}

/// In-memory cache of derived pairwise keys, keyed by peer username
#[derive(Clone)]
pub struct PairwiseKeyCache {
    keys: Arc<RwLock<HashMap<String, CachedKey>>>,
}

impl PairwiseKeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store the key derived from `published` for `username`
    pub async fn store_key(&self, username: &str, published: &str, key: PairwiseKey) {
        let mut keys = self.keys.write().await;
        keys.insert(
            username.to_string(),
            CachedKey {
                published: published.to_string(),
                key,
            },
        );
        tracing::debug!(
            "🔑 Pairwise key cached for peer: {} (total keys: {})",
            username,
            keys.len()
        );
    }

    /// Cached key for `username`, only if it was derived from `published`
    pub async fn get_key(&self, username: &str, published: &str) -> Option<PairwiseKey> {
        let keys = self.keys.read().await;
        keys.get(username)
            .filter(|entry| entry.published == published)
            .map(|entry| entry.key.clone())
    }

    /// Drop every entry whose peer is gone or whose published key changed
    ///
    /// `directory` maps usernames to their currently published keys.
    pub async fn retain_directory(&self, directory: &HashMap<String, String>) -> usize {
        let mut keys = self.keys.write().await;
        let before = keys.len();
        keys.retain(|username, entry| {
            directory
                .get(username)
                .is_some_and(|published| *published == entry.published)
        });
        let removed = before - keys.len();
        if removed > 0 {
            tracing::info!(
                "🗑️  Invalidated {} pairwise key(s) (remaining: {})",
                removed,
                keys.len()
            );
        }
        removed
    }

    /// Number of cached keys
    pub async fn count(&self) -> usize {
        self.keys.read().await.len()
    }
}

impl Default for PairwiseKeyCache {
    fn default() -> Self {
        Self::new()
    }
}
