//! Response Cache Module
//!
//! Memory-only mapping from request signature to cached response. Entries
//! expire lazily: freshness is checked on lookup and stale entries are
//! dropped there, never by a background sweep.
//!
//! Every invalidation or clear advances a generation counter. A response
//! fetched under an older generation is not stored, so a read that was in
//! flight across a mutation cannot put pre-mutation data back.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::cache::{CacheEntry, CacheKey, CacheStats};
use crate::transport::ApiResponse;

// == Response Cache ==
/// Read-through cache for idempotent responses.
#[derive(Debug)]
pub struct ResponseCache {
    /// Cached responses by key
    entries: HashMap<CacheKey, CacheEntry>,
    /// Lookup and invalidation counters
    stats: CacheStats,
    /// TTL applied when a caller does not specify one
    default_ttl: Duration,
    /// Advanced by every invalidation and clear
    generation: u64,
}

impl ResponseCache {
    // == Constructor ==
    /// Creates an empty cache with the given default TTL.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            default_ttl,
            generation: 0,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Current generation; capture it before fetching a cacheable response.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    // == Lookup ==
    /// Returns the cached entry for `key` if it is still fresh.
    ///
    /// Absent and expired entries are both misses; an expired entry is
    /// removed on the way out.
    pub fn lookup(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        self.lookup_at(key, Instant::now())
    }

    /// Same as [`lookup`](Self::lookup) with an explicit clock reading.
    pub fn lookup_at(&mut self, key: &CacheKey, now: Instant) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let entry = entry.clone();
                self.stats.record_hit();
                debug!(key = %key, "cache hit");
                Some(entry)
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_miss();
                debug!(key = %key, "cache entry expired");
                None
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Store ==
    /// Stores a response under `key`, replacing any previous entry.
    ///
    /// `ttl` of `None` uses the cache default.
    pub fn store(&mut self, key: CacheKey, value: ApiResponse, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "cache store");
        self.entries.insert(key, CacheEntry::new(value, ttl));
        self.stats.record_store();
        self.stats.set_total_entries(self.entries.len());
    }

    /// Stores a response fetched while the cache was at `generation`.
    ///
    /// Returns false, storing nothing, if an invalidation or clear ran
    /// since then.
    pub fn store_if_current(
        &mut self,
        key: CacheKey,
        value: ApiResponse,
        ttl: Option<Duration>,
        generation: u64,
    ) -> bool {
        if generation != self.generation {
            debug!(key = %key, "discarding response fetched before invalidation");
            return false;
        }
        self.store(key, value, ttl);
        true
    }

    // == Invalidate ==
    /// Removes every entry whose key starts with or equals `prefix`.
    ///
    /// Returns the number of entries removed.
    pub fn invalidate(&mut self, prefix: &str) -> usize {
        self.generation += 1;
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.matches_prefix(prefix));
        let removed = before - self.entries.len();

        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(self.entries.len());
        if removed > 0 {
            debug!(prefix, removed, "cache invalidated");
        }
        removed
    }

    /// Removes exactly `key`. Returns true if an entry was present.
    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.generation += 1;
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.stats.record_invalidations(1);
            self.stats.set_total_entries(self.entries.len());
            debug!(key = %key, "cache entry removed");
        }
        removed
    }

    // == Clear ==
    /// Drops every entry. Used when the session ends.
    pub fn clear(&mut self) {
        self.generation += 1;
        let removed = self.entries.len();
        self.entries.clear();
        self.stats.record_invalidations(removed);
        self.stats.set_total_entries(0);
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    /// Number of entries held, fresh or not yet lazily evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
