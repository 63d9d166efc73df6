//! Request Descriptor Module
//!
//! A closed description of one outbound call. Descriptors are built with
//! [`RequestBuilder`] and checked once at [`RequestBuilder::build`], so the
//! pipeline never sees a cacheable mutation or a GET with a body.

use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::cache::CacheKey;
use crate::error::{ClientError, Result};
use crate::models::FileUpload;

// == Method ==
/// HTTP methods used by the backend API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Only reads are idempotent enough to cache.
    pub fn is_read(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Multipart Form ==
/// Owned multipart payload; kept as data so a retried request is identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    /// Plain text fields, repeated names allowed
    pub fields: Vec<(String, String)>,
    /// File parts, repeated names allowed
    pub files: Vec<(String, FileUpload)>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: FileUpload) -> Self {
        self.files.push((name.into(), file));
        self
    }
}

// == Request Body ==
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

// == Cache Policy ==
/// Whether a response may be served from and written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Always go to the network
    Bypass,
    /// Cache with the store's default TTL
    Default,
    /// Cache with a specific TTL
    Ttl(Duration),
}

// == Invalidation ==
/// Cache entries cleared once a mutation succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Every key that starts with or equals the prefix
    Prefix(String),
    /// Exactly one key
    Key(CacheKey),
}

// == Request Descriptor ==
/// One outbound call, constructed per request and never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    cache: CachePolicy,
    invalidates: Vec<Invalidation>,
    refresh_on_unauthorized: bool,
}

impl RequestDescriptor {
    pub fn get(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(Method::Delete, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn is_cacheable(&self) -> bool {
        !matches!(self.cache, CachePolicy::Bypass)
    }

    /// TTL to store with; `None` means the cache default.
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache {
            CachePolicy::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }

    /// Cache entries cleared after this request succeeds.
    pub fn invalidates(&self) -> &[Invalidation] {
        &self.invalidates
    }

    /// False for anonymous endpoints where a 401 is a plain failure.
    pub fn refreshes_on_unauthorized(&self) -> bool {
        self.refresh_on_unauthorized
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.method, &self.path, &self.query)
    }
}

// == Request Builder ==
/// Builder for [`RequestDescriptor`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    descriptor: RequestDescriptor,
}

impl RequestBuilder {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            descriptor: RequestDescriptor {
                method,
                path: path.into(),
                query: Vec::new(),
                body: RequestBody::Empty,
                cache: CachePolicy::Bypass,
                invalidates: Vec::new(),
                refresh_on_unauthorized: true,
            },
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.descriptor.query.push((name.into(), value.to_string()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.descriptor.body = RequestBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.descriptor.body = RequestBody::Multipart(form);
        self
    }

    /// Caches the response with the store's default TTL.
    pub fn cached(mut self) -> Self {
        self.descriptor.cache = CachePolicy::Default;
        self
    }

    /// Caches the response for `ttl`.
    pub fn cached_for(mut self, ttl: Duration) -> Self {
        self.descriptor.cache = CachePolicy::Ttl(ttl);
        self
    }

    /// Clears every cached read under `prefix` once this request succeeds.
    pub fn invalidates(mut self, prefix: impl Into<String>) -> Self {
        self.descriptor
            .invalidates
            .push(Invalidation::Prefix(prefix.into()));
        self
    }

    /// Clears the single cached read `key` once this request succeeds.
    pub fn invalidates_key(mut self, key: CacheKey) -> Self {
        self.descriptor.invalidates.push(Invalidation::Key(key));
        self
    }

    /// Marks an anonymous endpoint: no bearer, no refresh on 401.
    pub fn without_refresh(mut self) -> Self {
        self.descriptor.refresh_on_unauthorized = false;
        self
    }

    /// Checks the descriptor's shape and returns it.
    pub fn build(self) -> Result<RequestDescriptor> {
        let d = self.descriptor;

        if !d.path.starts_with('/') {
            return Err(ClientError::validation(
                "path",
                format!("'{}' must start with '/'", d.path),
            ));
        }
        if d.is_cacheable() && !d.method.is_read() {
            return Err(ClientError::validation(
                "cacheable",
                format!("{} requests cannot be cached", d.method),
            ));
        }
        if d.method.is_read() && d.body != RequestBody::Empty {
            return Err(ClientError::validation("body", "GET requests carry no body"));
        }
        if d.method.is_read() && !d.invalidates.is_empty() {
            return Err(ClientError::validation(
                "invalidates",
                "GET requests do not invalidate the cache",
            ));
        }
        if let CachePolicy::Ttl(ttl) = d.cache {
            if ttl.is_zero() {
                return Err(ClientError::validation("cache_ttl", "TTL must be positive"));
            }
        }

        Ok(d)
    }
}
