//! Transport Module
//!
//! The seam between the request pipeline and the network. The pipeline hands
//! a descriptor and an optional bearer token to a [`Transport`] and gets back
//! the raw status and body text.

mod http;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ClientError, Result};
use crate::pipeline::RequestDescriptor;

pub use http::ReqwestTransport;

// == Raw Response ==
/// Status and undecoded body as received from the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// == Api Response ==
/// A decoded successful response, the unit the cache stores.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body; `Null` when the backend sent nothing
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Decodes a raw success. Empty bodies become `Null`; a body that is
    /// not JSON is kept as a string value.
    pub fn from_raw(raw: &RawResponse) -> Self {
        let body = if raw.body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&raw.body).unwrap_or_else(|_| Value::String(raw.body.clone()))
        };
        Self::new(raw.status, body)
    }

    /// Deserializes the body into a typed model.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|err| ClientError::Decode {
            message: format!("status {}: {}", self.status, err),
        })
    }
}

// == Transport Trait ==
/// Executes one HTTP exchange.
///
/// Implementations return `Ok` for every HTTP response, whatever its status,
/// and `Err(ClientError::Network)` only when no response was obtained.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<RawResponse>;
}
