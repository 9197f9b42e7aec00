//! Short-TTL read cache with prefix invalidation.
//!
//! DESIGN
//! ======
//! Entries expire a fixed duration after insertion, independent of access.
//! Stale entries are evicted lazily on read; mutations invalidate by key
//! prefix. There is no size bound: the keyspace is the set of distinct
//! settings/listing queries, not request volume.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    stored_at: Instant,
}

/// Cheap to clone; clones share entries.
#[derive(Debug, Clone)]
pub struct TtlCache<T> {
    entries: Arc<Mutex<HashMap<String, CacheEntry<T>>>>,
    ttl: Duration,
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T: Clone> TtlCache<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entries: Arc::new(Mutex::new(HashMap::new())), ttl }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_at(key, Instant::now())
    }

    /// Lookup with an explicit clock (for testing).
    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<T> {
        let mut entries = self.entries();
        let entry = entries.get(key)?;
        if now.saturating_duration_since(entry.stored_at) <= self.ttl {
            return Some(entry.data.clone());
        }
        entries.remove(key);
        None
    }

    pub fn set(&self, key: impl Into<String>, data: T) {
        self.set_at(key, data, Instant::now());
    }

    pub(crate) fn set_at(&self, key: impl Into<String>, data: T, now: Instant) {
        self.entries()
            .insert(key.into(), CacheEntry { data, stored_at: now });
    }

    /// Remove every entry whose key starts with `prefix`. Returns how many went.
    pub fn invalidate(&self, prefix: &str) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `prefix:json(params)`. Falls back to the bare prefix if `params` cannot be
/// serialized, which only widens what a lookup shares.
pub fn cache_key<P: Serialize>(prefix: &str, params: &P) -> String {
    match serde_json::to_string(params) {
        Ok(json) => format!("{prefix}:{json}"),
        Err(_) => prefix.to_owned(),
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
