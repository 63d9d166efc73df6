//! Cache Entry Module
//!
//! Defines the structure for individual cached responses with TTL support.

use std::time::Duration;

use tokio::time::Instant;

use crate::transport::ApiResponse;

// == Cache Entry ==
/// A cached response together with the moment it was stored and its TTL.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored response
    pub value: ApiResponse,
    /// When the response was stored
    pub stored_at: Instant,
    /// How long the response stays fresh
    pub ttl: Duration,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped with the current time.
    pub fn new(value: ApiResponse, ttl: Duration) -> Self {
        Self::stored_at(value, Instant::now(), ttl)
    }

    /// Creates a cache entry with an explicit store time.
    pub fn stored_at(value: ApiResponse, stored_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            stored_at,
            ttl,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired once `now - stored_at >= ttl`,
    /// so a zero TTL is never served.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) >= self.ttl
    }

    /// Checks if the entry has expired as of the current time.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining freshness, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl
            .saturating_sub(Instant::now().saturating_duration_since(self.stored_at))
    }
}
