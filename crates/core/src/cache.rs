// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Response cache for read-mostly reference data.
//!
//! Entries live in the persistent store under `<namespace><key>` as
//! `{data, timestamp, version}` JSON documents. Validity is checked lazily on
//! read: stale, corrupt and old-version entries are deleted and reported as a
//! miss. Writes trigger an oldest-first cull down to `max_size`.
//!
//! The cache never fails a read. Store errors are logged and treated as a miss.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{ClockSource, SystemClock};
use crate::store::KeyValueStore;

/// Default storage namespace.
pub const DEFAULT_NAMESPACE: &str = "materials_cache_";

/// Entry format version written by this build.
pub const CACHE_VERSION: u32 = 1;

/// Configuration for [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age of a visible entry.
    pub ttl: Duration,
    /// Maximum number of entries kept in the namespace.
    pub max_size: usize,
    /// Prefix for every storage key owned by this cache.
    pub namespace: String,
    /// Entries written with any other version are treated as stale.
    pub version: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_size: 50,
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: CACHE_VERSION,
        }
    }
}

/// Stored form of a cached payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    /// Store time in milliseconds since Unix epoch.
    pub timestamp: u64,
    pub version: u32,
}

/// True for payloads that are never cached.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// TTL cache over a [`KeyValueStore`].
pub struct ResponseCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn ClockSource>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Creates a cache using the system clock.
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self::with_clock(store, Arc::new(SystemClock), config)
    }

    /// Creates a cache with a custom clock source.
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn ClockSource>,
        config: CacheConfig,
    ) -> Self {
        ResponseCache {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.config.namespace, key)
    }

    fn drop_entry(&self, storage_key: &str) {
        if let Err(e) = self.store.remove(storage_key) {
            warn!(key = storage_key, error = %e, "failed to remove cache entry");
        }
    }

    /// Returns the cached payload, or `None` when absent, stale or corrupt.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let storage_key = self.storage_key(key);
        let raw = match self.store.get(&storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "corrupt cache entry, removing");
                self.drop_entry(&storage_key);
                return None;
            }
        };

        let age_ms = self.clock.now_ms().saturating_sub(entry.timestamp);
        if entry.version != self.config.version || age_ms >= self.config.ttl.as_millis() as u64 {
            debug!(key, age_ms, version = entry.version, "stale cache entry, removing");
            self.drop_entry(&storage_key);
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(payload) => {
                debug!(key, age_ms, "cache hit");
                Some(payload)
            }
            Err(e) => {
                warn!(key, error = %e, "cache entry has unexpected shape, removing");
                self.drop_entry(&storage_key);
                None
            }
        }
    }

    /// Stores a payload. Empty payloads are ignored.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, payload: &T) {
        let data = match serde_json::to_value(payload) {
            Ok(data) => data,
            Err(e) => {
                warn!(key, error = %e, "cannot serialize cache payload");
                return;
            }
        };
        if is_empty_payload(&data) {
            debug!(key, "not caching empty payload");
            return;
        }

        let entry = CacheEntry {
            data,
            timestamp: self.clock.now_ms(),
            version: self.config.version,
        };
        let storage_key = self.storage_key(key);
        let written = serde_json::to_string(&entry)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                self.store
                    .set(&storage_key, &raw)
                    .map_err(|e| e.to_string())
            });
        if let Err(e) = written {
            warn!(key, error = %e, "cache write failed");
            return;
        }
        self.evict_oldest(Some(&storage_key));
    }

    /// Returns the cached value, or runs `fetch`, caches and returns its result.
    ///
    /// Fetch errors propagate and are never cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &str, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get(key) {
            return Ok(cached);
        }
        let fresh = fetch().await?;
        self.set(key, &fresh);
        Ok(fresh)
    }

    pub fn remove(&self, key: &str) {
        self.drop_entry(&self.storage_key(key));
    }

    /// Storage keys owned by this cache.
    fn own_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.config.namespace))
                .collect(),
            Err(e) => {
                warn!(error = %e, "cannot list cache entries");
                Vec::new()
            }
        }
    }

    /// Removes every entry in this cache's namespace and nothing else.
    pub fn clear(&self) {
        for key in self.own_keys() {
            self.drop_entry(&key);
        }
    }

    /// Number of entries in the namespace, including not-yet-collected stale ones.
    pub fn len(&self) -> usize {
        self.own_keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the oldest entries until at most `max_size` remain.
    ///
    /// Unreadable entries count as oldest.
    pub fn cleanup(&self) {
        self.evict_oldest(None);
    }

    /// Culls down to `max_size`, never evicting `keep` (the entry just written).
    fn evict_oldest(&self, keep: Option<&str>) {
        let keys = self.own_keys();
        if keys.len() <= self.config.max_size {
            return;
        }
        let surplus = keys.len() - self.config.max_size;

        let mut stamped: Vec<(u64, String)> = keys
            .into_iter()
            .filter(|key| Some(key.as_str()) != keep)
            .map(|key| {
                let timestamp = self
                    .store
                    .get(&key)
                    .ok()
                    .flatten()
                    .and_then(|raw| serde_json::from_str::<CacheEntry>(&raw).ok())
                    .map(|entry| entry.timestamp)
                    .unwrap_or(0);
                (timestamp, key)
            })
            .collect();
        stamped.sort();

        for (_, key) in stamped.into_iter().take(surplus) {
            debug!(key = %key, "evicting cache entry");
            self.drop_entry(&key);
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
