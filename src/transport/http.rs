//! Reqwest Transport
//!
//! Sends descriptors over HTTP with reqwest. JSON bodies go out as
//! `application/json`; file-bearing bodies as `multipart/form-data`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::pipeline::{Method, MultipartForm, RequestBody, RequestDescriptor};
use crate::transport::{RawResponse, Transport};

// == Reqwest Transport ==
/// HTTP transport rooted at the backend's base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Creates a transport for `base_url` (e.g. `http://localhost:8081/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::network)?;

        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
    }
}

/// Builds a fresh reqwest form; forms are consumed on send, so retries
/// rebuild from the owned descriptor.
fn build_form(form: &MultipartForm) -> Result<Form> {
    let mut out = Form::new();
    for (name, value) in &form.fields {
        out = out.text(name.clone(), value.clone());
    }
    for (name, file) in &form.files {
        let part = Part::bytes(file.data.clone())
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)
            .map_err(|err| ClientError::validation(name.clone(), err.to_string()))?;
        out = out.part(name.clone(), part);
    }
    Ok(out)
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        bearer: Option<&str>,
    ) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(reqwest_method(request.method()), self.url(request.path()));

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(form) => builder.multipart(build_form(form)?),
        };

        let response = builder.send().await.map_err(|err| {
            warn!(method = %request.method(), path = request.path(), "request failed: {}", err);
            ClientError::network(err)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(ClientError::network)?;
        debug!(method = %request.method(), path = request.path(), status, "response received");

        Ok(RawResponse::new(status, body))
    }
}
