//! Configuration Module
//!
//! Handles loading and managing client configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Client configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, including the `/api` prefix
    pub api_url: String,
    /// File holding the persisted credential slots
    pub credentials_path: PathBuf,
    /// Default TTL in milliseconds for cached reads
    pub default_cache_ttl_ms: u64,
    /// TTL in milliseconds for the paginated feed
    pub feed_cache_ttl_ms: u64,
    /// Per-request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `FEED_API_URL` - Backend base URL (default: http://localhost:8081/api)
    /// - `FEED_CREDENTIALS_PATH` - Credential file (default: .feed_client/credentials.json)
    /// - `FEED_CACHE_TTL_MS` - Default read TTL (default: 300000)
    /// - `FEED_FEED_TTL_MS` - Feed page TTL (default: 120000)
    /// - `FEED_REQUEST_TIMEOUT_MS` - Request timeout (default: 30000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: env::var("FEED_API_URL").unwrap_or(defaults.api_url),
            credentials_path: env::var("FEED_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.credentials_path),
            default_cache_ttl_ms: env::var("FEED_CACHE_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_cache_ttl_ms),
            feed_cache_ttl_ms: env::var("FEED_FEED_TTL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.feed_cache_ttl_ms),
            request_timeout_ms: env::var("FEED_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    /// Default TTL for cached reads.
    pub fn default_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.default_cache_ttl_ms)
    }

    /// TTL for the paginated feed.
    pub fn feed_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.feed_cache_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8081/api".to_string(),
            credentials_path: PathBuf::from(".feed_client/credentials.json"),
            default_cache_ttl_ms: 5 * 60 * 1000,
            feed_cache_ttl_ms: 2 * 60 * 1000,
            request_timeout_ms: 30_000,
        }
    }
}
