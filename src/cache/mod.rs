//! Process-local time-bounded cache.
//!
//! This module provides the `Cache` shared by every fetcher: a key/value
//! store mapping string keys to serialized values with an expiry instant.
//! Entries are created on successful fetches, overwritten by background
//! revalidation, and removed either explicitly after a mutation or lazily
//! when read past their expiry. Nothing is persisted; the cache is lost when
//! the process exits.
//!
//! Cached data types include:
//! - Orphan lists (full, lightweight, paginated) and single-orphan details
//! - Sponsor and team-member lists
//! - Conversation and message lists

pub mod keys;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::debug;

/// Time-to-live for primary entity lists (orphans, sponsors, team members).
/// Balances freshness with reducing remote queries for slowly-changing data.
pub const LIST_TTL: Duration = Duration::from_secs(5 * 60);

/// Time-to-live for conversation and message lists.
/// Short because messaging data goes stale quickly between live sessions.
pub const MESSAGING_TTL: Duration = Duration::from_secs(2 * 60);

/// Time-to-live for empty results. Caching the absence of rows keeps a user
/// with genuinely zero rows from hammering the remote store on every render.
pub const EMPTY_TTL: Duration = Duration::from_secs(30);

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// In-process key/value cache with per-entry expiry.
///
/// Shared behind an `Arc` by all fetchers. The interior mutex guards only
/// short synchronous map operations; overlapping background revalidations for
/// the same key simply overwrite each other (last write wins).
#[derive(Default)]
pub struct Cache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` if present and not expired.
    ///
    /// Expired entries are removed lazily here; there is no background sweep.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                serde_json::from_value(entry.value.clone()).ok()
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`, expiring after `ttl`. Overwrites any
    /// existing entry unconditionally.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let serialized = match serde_json::to_value(value) {
            Ok(v) => v,
            Err(e) => {
                debug!(key, error = %e, "Failed to serialize value for cache");
                return;
            }
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.to_string(),
            Entry {
                value: serialized,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove the entry for `key` if present; no error if absent.
    pub fn remove(&self, key: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
    }

    /// Remove every entry whose key starts with `prefix`.
    ///
    /// Mutations cannot enumerate actor-scoped list keys from their arguments
    /// alone, so domain invalidation sweeps by the domain's key prefix
    /// instead (see `keys` for the per-domain prefixes).
    pub fn remove_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|key, _| !key.starts_with(prefix));
    }

    /// Number of live (non-expired) entries.
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        entries.values().filter(|e| e.expires_at > now).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
