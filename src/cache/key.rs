//! Cache Key Module
//!
//! Derives deterministic cache keys from the method, path and sorted query
//! parameters of a request. Bodies never participate in the key.

use std::fmt;

use url::form_urlencoded;

use crate::pipeline::Method;

// == Cache Key ==
/// Deterministic signature of an idempotent request.
///
/// Rendered as `METHOD /path` followed by `?k=v&...` when parameters are
/// present, with parameters sorted by name then value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Builds the key for a request.
    pub fn new(method: Method, path: &str, query: &[(String, String)]) -> Self {
        let mut key = Self::prefix(method, path);
        if !query.is_empty() {
            let mut sorted: Vec<&(String, String)> = query.iter().collect();
            sorted.sort();

            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (name, value) in sorted {
                serializer.append_pair(name, value);
            }
            key.push('?');
            key.push_str(&serializer.finish());
        }
        Self(key)
    }

    /// Builds an invalidation prefix covering every key under `path`.
    pub fn prefix(method: Method, path: &str) -> String {
        format!("{} {}", method.as_str(), path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this key starts with, or equals, `prefix`.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
