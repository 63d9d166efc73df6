//! Cache Module
//!
//! Provides the memory-only read-through response cache with lazy TTL
//! expiration and prefix invalidation.

mod entry;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key::CacheKey;
pub use stats::CacheStats;
pub use store::ResponseCache;
