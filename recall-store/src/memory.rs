//! In-memory expiring store.
//!
//! Entries carry an absolute deadline. When the store is full, expired
//! entries are purged first and then the live entry closest to its deadline
//! is evicted, since it has the least remaining value.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use recall_core::constants::DEFAULT_STORE_MAX_ENTRIES;
use recall_core::error::Result;
use recall_core::traits::{ComputeFn, DurableCache};
use recall_core::types::ComputationKey;

struct StoredEntry {
    value: Vec<u8>,
    /// `None` when the deadline lies beyond what `Instant` can represent.
    deadline: Option<Instant>,
}

impl StoredEntry {
    fn new(value: Vec<u8>, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            deadline: now.checked_add(ttl),
        }
    }

    fn is_expired_at(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Sort key that places the soonest deadline first and unbounded entries last.
    fn eviction_rank(&self) -> (bool, Option<Instant>) {
        (self.deadline.is_none(), self.deadline)
    }
}

/// Store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Drop expired entries before evicting a live one
    pub purge_expired_first: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_STORE_MAX_ENTRIES,
            purge_expired_first: true,
        }
    }
}

/// Expiring in-memory durable cache.
///
/// Thread-safe. The value is computed without holding any lock, so
/// concurrent misses on one key may both compute and the last insert wins.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    config: StoreConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryStore {
    /// Creates a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with custom configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Gets an unexpired value by key.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        self.entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.value.clone())
    }

    /// Stores a value that expires after `ttl`, making room if the store is full.
    ///
    /// A ttl too large to represent never expires.
    pub fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.write();

        if !entries.contains_key(key) && entries.len() >= self.config.max_entries {
            self.make_room(&mut entries, now);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl, now));
    }

    fn make_room(&self, entries: &mut HashMap<String, StoredEntry>, now: Instant) {
        if self.config.purge_expired_first {
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            let purged = before - entries.len();
            if purged > 0 {
                debug!(purged, "Purged expired entries to make room");
            }
            if entries.len() < self.config.max_entries {
                return;
            }
        }

        let victim = entries
            .iter()
            .min_by_key(|(_, entry)| entry.eviction_rank())
            .map(|(key, _)| key.clone());
        if let Some(victim) = victim {
            debug!(key = %victim, "Evicting entry closest to expiry");
            entries.remove(&victim);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Removes an entry. Returns true if one was present.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Removes all expired entries, returning how many were dropped.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Returns a snapshot of occupancy and lookup counters.
    pub fn stats(&self) -> StoreStats {
        let now = Instant::now();
        let entries = self.entries.read();
        let expired = entries.values().filter(|entry| entry.is_expired_at(now)).count();
        StoreStats {
            live: entries.len() - expired,
            expired,
            capacity: self.config.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DurableCache for MemoryStore {
    #[instrument(skip(self, compute), fields(key = %key))]
    fn get_or_compute(
        &self,
        key: &ComputationKey,
        ttl: Duration,
        compute: &mut ComputeFn<'_>,
    ) -> Result<Vec<u8>> {
        if let Some(value) = self.get(key.as_str()) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Store hit");
            return Ok(value);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(ttl_secs = ttl.as_secs(), "Store miss, computing");

        let value = compute()?;
        self.insert(key.as_str(), value.clone(), ttl);
        Ok(value)
    }

    fn clear(&self) -> Result<()> {
        let dropped = {
            let mut entries = self.entries.write();
            let count = entries.len();
            entries.clear();
            count
        };
        debug!(dropped, "Cleared memory store");
        Ok(())
    }
}

/// Snapshot of a [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreStats {
    /// Entries still served
    pub live: usize,
    /// Entries past their deadline but not yet dropped
    pub expired: usize,
    /// Configured maximum
    pub capacity: usize,
    /// Lookups answered from the store
    pub hits: u64,
    /// Lookups that had to compute
    pub misses: u64,
    /// Live entries dropped to make room
    pub evictions: u64,
}
