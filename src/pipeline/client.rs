//! Request Pipeline Module
//!
//! Wraps every outbound call: serves cacheable reads from the response
//! cache, attaches the bearer token, renews the token once on a 401, and
//! writes or invalidates cache entries on success.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheStats, ResponseCache};
use crate::credentials::CredentialStore;
use crate::error::{ClientError, Result, GENERIC_ERROR_MESSAGE};
use crate::pipeline::{Invalidation, RefreshCoordinator, RefreshPhase, RequestDescriptor};
use crate::transport::{ApiResponse, RawResponse, Transport};

const UNAUTHORIZED: u16 = 401;

// == Request Pipeline ==
/// The single path every domain operation takes to the backend.
pub struct RequestPipeline {
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    cache: Arc<RwLock<ResponseCache>>,
    refresh: Arc<RefreshCoordinator>,
}

impl RequestPipeline {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        cache: Arc<RwLock<ResponseCache>>,
    ) -> Self {
        let refresh = Arc::new(RefreshCoordinator::new(
            transport.clone(),
            credentials.clone(),
            cache.clone(),
        ));
        Self {
            transport,
            credentials,
            cache,
            refresh,
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Drops every cached response.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }

    pub async fn refresh_phase(&self) -> RefreshPhase {
        self.refresh.phase().await
    }

    /// Number of token exchanges performed this session.
    pub fn refresh_count(&self) -> u64 {
        self.refresh.exchange_count()
    }

    // == Send ==
    /// Sends `request` and returns its decoded response.
    pub async fn send(&self, request: &RequestDescriptor) -> Result<ApiResponse> {
        let key = request.cache_key();

        // Generation at dispatch; a response fetched across an invalidation
        // is returned to its caller but not cached.
        let generation = {
            let mut cache = self.cache.write().await;
            if request.is_cacheable() {
                if let Some(entry) = cache.lookup(&key) {
                    return Ok(entry.value);
                }
            }
            cache.generation()
        };

        let bearer = if request.refreshes_on_unauthorized() {
            self.credentials.access_token().await
        } else {
            None
        };

        let raw = self.transport.execute(request, bearer.as_deref()).await?;
        if raw.status != UNAUTHORIZED || !request.refreshes_on_unauthorized() {
            return self.complete(request, key, generation, raw).await;
        }

        // One renewal, one replay. A second 401 is terminal.
        debug!(method = %request.method(), path = request.path(), "unauthorized, renewing token");
        let token = self.refresh.renew(bearer.as_deref()).await?;
        let retried = self.transport.execute(request, Some(&token)).await?;
        if retried.status == UNAUTHORIZED {
            warn!(method = %request.method(), path = request.path(), "rejected after token renewal");
            return Err(ClientError::ReauthenticationRequired);
        }
        self.complete(request, key, generation, retried).await
    }

    /// Applies cache effects of a response and converts failures.
    async fn complete(
        &self,
        request: &RequestDescriptor,
        key: CacheKey,
        generation: u64,
        raw: RawResponse,
    ) -> Result<ApiResponse> {
        if !raw.is_success() {
            return Err(http_error(&raw));
        }

        let response = ApiResponse::from_raw(&raw);
        if request.is_cacheable() {
            self.cache.write().await.store_if_current(
                key,
                response.clone(),
                request.cache_ttl(),
                generation,
            );
        } else if !request.invalidates().is_empty() {
            let mut cache = self.cache.write().await;
            for invalidation in request.invalidates() {
                match invalidation {
                    Invalidation::Prefix(prefix) => {
                        cache.invalidate(prefix);
                    }
                    Invalidation::Key(key) => {
                        cache.remove(key);
                    }
                }
            }
        }
        Ok(response)
    }
}

/// Normalizes a failed response into `ClientError::Http`.
///
/// The message comes from the body's `message` field, then `error`, and
/// falls back to a generic text when the body is absent or not JSON.
pub fn http_error(raw: &RawResponse) -> ClientError {
    let message = serde_json::from_str::<Value>(&raw.body)
        .ok()
        .and_then(|body| {
            ["message", "error"]
                .iter()
                .find_map(|field| body.get(field).and_then(Value::as_str).map(str::to_string))
        })
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string());

    ClientError::Http {
        status: raw.status,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credential, FileSlotStorage};
    use crate::pipeline::REFRESH_PATH;
    use async_trait::async_trait;
    use crate::pipeline::Method;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// Records every call and answers from a script, falling back to 200 `{}`.
    #[derive(Default)]
    struct ScriptedTransport {
        script: StdMutex<VecDeque<RawResponse>>,
        calls: StdMutex<Vec<(String, Option<String>)>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                script: StdMutex::new(responses.into()),
                calls: StdMutex::default(),
            })
        }

        fn calls(&self) -> Vec<(String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(
            &self,
            request: &RequestDescriptor,
            bearer: Option<&str>,
        ) -> Result<RawResponse> {
            self.calls.lock().unwrap().push((
                format!("{} {}", request.method(), request.path()),
                bearer.map(str::to_string),
            ));
            let next = self.script.lock().unwrap().pop_front();
            Ok(next.unwrap_or_else(|| RawResponse::new(200, "{}")))
        }
    }

    async fn pipeline(dir: &TempDir, transport: Arc<ScriptedTransport>) -> RequestPipeline {
        let storage = FileSlotStorage::new(dir.path().join("credentials.json"));
        let credentials = CredentialStore::init(Arc::new(storage)).await.unwrap();
        credentials
            .set(&Credential::new("access-1", "refresh-1"))
            .await
            .unwrap();
        let cache = Arc::new(RwLock::new(ResponseCache::new(Duration::from_secs(300))));
        RequestPipeline::new(transport, credentials, cache)
    }

    fn feed() -> RequestDescriptor {
        RequestDescriptor::get("/posts")
            .query("page", 1)
            .cached_for(Duration::from_secs(120))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_attaches_bearer() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let request = RequestDescriptor::get("/users/me").build().unwrap();
        pipeline.send(&request).await.unwrap();

        assert_eq!(
            transport.calls(),
            vec![("GET /users/me".to_string(), Some("access-1".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_cache_hit_suppresses_network() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![RawResponse::new(200, r#"{"posts":[]}"#)]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let first = pipeline.send(&feed()).await.unwrap();
        let second = pipeline.send(&feed()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(pipeline.cache_stats().await.hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_goes_back_to_network() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        pipeline.send(&feed()).await.unwrap();
        tokio::time::advance(Duration::from_secs(121)).await;
        pipeline.send(&feed()).await.unwrap();

        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_mutation_invalidates_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        pipeline.send(&feed()).await.unwrap();
        let create = RequestDescriptor::post("/posts")
            .invalidates("GET /posts")
            .build()
            .unwrap();
        pipeline.send(&create).await.unwrap();
        pipeline.send(&feed()).await.unwrap();

        assert_eq!(transport.calls().len(), 3);
    }

    /// Serves `{"v": n}` for reads, where `n` counts completed writes at
    /// the time the read reached the backend. Reads wait on `release`
    /// while `hold` is set.
    #[derive(Default)]
    struct GatedBackend {
        version: AtomicU64,
        reads: AtomicU64,
        hold: AtomicBool,
        arrived: Notify,
        release: Notify,
    }

    #[async_trait]
    impl Transport for GatedBackend {
        async fn execute(
            &self,
            request: &RequestDescriptor,
            _bearer: Option<&str>,
        ) -> Result<RawResponse> {
            if request.method() != Method::Get {
                self.version.fetch_add(1, Ordering::SeqCst);
                return Ok(RawResponse::new(200, "{}"));
            }
            let version = self.version.load(Ordering::SeqCst);
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.hold.load(Ordering::SeqCst) {
                self.arrived.notify_one();
                self.release.notified().await;
            }
            Ok(RawResponse::new(200, format!(r#"{{"v":{}}}"#, version)))
        }
    }

    async fn gated_pipeline(dir: &TempDir) -> (Arc<RequestPipeline>, Arc<GatedBackend>) {
        let storage = FileSlotStorage::new(dir.path().join("credentials.json"));
        let credentials = CredentialStore::init(Arc::new(storage)).await.unwrap();
        credentials
            .set(&Credential::new("access-1", "refresh-1"))
            .await
            .unwrap();
        let backend = Arc::new(GatedBackend::default());
        backend.hold.store(true, Ordering::SeqCst);
        let cache = Arc::new(RwLock::new(ResponseCache::new(Duration::from_secs(300))));
        let pipeline = Arc::new(RequestPipeline::new(backend.clone(), credentials, cache));
        (pipeline, backend)
    }

    fn post_detail() -> RequestDescriptor {
        RequestDescriptor::get("/posts/1").cached().build().unwrap()
    }

    #[tokio::test]
    async fn test_read_in_flight_across_mutation_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, backend) = gated_pipeline(&dir).await;

        let in_flight = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.send(&post_detail()).await })
        };
        backend.arrived.notified().await;

        let edit = RequestDescriptor::put("/posts/1")
            .invalidates("GET /posts")
            .build()
            .unwrap();
        pipeline.send(&edit).await.unwrap();

        backend.hold.store(false, Ordering::SeqCst);
        backend.release.notify_one();
        let early = in_flight.await.unwrap().unwrap();
        assert_eq!(early.body["v"], 0);

        let after = pipeline.send(&post_detail()).await.unwrap();
        assert_eq!(after.body["v"], 1);
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);

        // The fresh read is cached as usual
        pipeline.send(&post_detail()).await.unwrap();
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_in_flight_across_clear_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let (pipeline, backend) = gated_pipeline(&dir).await;

        let in_flight = {
            let pipeline = pipeline.clone();
            tokio::spawn(async move { pipeline.send(&post_detail()).await })
        };
        backend.arrived.notified().await;

        pipeline.clear_cache().await;
        backend.hold.store(false, Ordering::SeqCst);
        backend.release.notify_one();
        in_flight.await.unwrap().unwrap();

        assert_eq!(pipeline.cache_stats().await.total_entries, 0);
        pipeline.send(&post_detail()).await.unwrap();
        assert_eq!(backend.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exact_key_invalidation_spares_neighbours() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![]);
        let pipeline = pipeline(&dir, transport.clone()).await;
        let one = RequestDescriptor::get("/posts/1").cached().build().unwrap();
        let twelve = RequestDescriptor::get("/posts/12").cached().build().unwrap();

        pipeline.send(&one).await.unwrap();
        pipeline.send(&twelve).await.unwrap();
        let comment = RequestDescriptor::post("/posts/1/comments")
            .invalidates_key(one.cache_key())
            .invalidates("GET /posts/1/")
            .build()
            .unwrap();
        pipeline.send(&comment).await.unwrap();
        pipeline.send(&one).await.unwrap();
        pipeline.send(&twelve).await.unwrap();

        let reads: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|(call, _)| call.starts_with("GET"))
            .collect();
        assert_eq!(reads.len(), 3);
    }

    #[tokio::test]
    async fn test_failed_mutation_keeps_cache() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![
            RawResponse::new(200, r#"{"posts":[]}"#),
            RawResponse::new(409, r#"{"message":"conflict"}"#),
        ]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        pipeline.send(&feed()).await.unwrap();
        let create = RequestDescriptor::post("/posts")
            .invalidates("GET /posts")
            .build()
            .unwrap();
        let err = pipeline.send(&create).await.unwrap_err();
        pipeline.send(&feed()).await.unwrap();

        assert_eq!(err.status(), Some(409));
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_http_error_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![RawResponse::new(
            500,
            r#"{"message":"boom"}"#,
        )]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let err = pipeline.send(&feed()).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 500,
                message: "boom".to_string()
            }
        );

        pipeline.send(&feed()).await.unwrap();
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_401_refreshes_and_retries_once() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![
            RawResponse::new(401, r#"{"message":"jwt expired"}"#),
            RawResponse::new(200, r#"{"token":"access-2"}"#),
            RawResponse::new(200, r#"{"_id":"u1"}"#),
        ]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let request = RequestDescriptor::get("/users/me").build().unwrap();
        let response = pipeline.send(&request).await.unwrap();

        assert_eq!(response.body["_id"], "u1");
        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1], (format!("POST {}", REFRESH_PATH), None));
        assert_eq!(
            calls[2],
            ("GET /users/me".to_string(), Some("access-2".to_string()))
        );
        assert_eq!(pipeline.refresh_count(), 1);
        assert_eq!(
            pipeline.credentials().access_token().await.as_deref(),
            Some("access-2")
        );
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![
            RawResponse::new(401, ""),
            RawResponse::new(200, r#"{"token":"access-2"}"#),
            RawResponse::new(401, ""),
        ]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let request = RequestDescriptor::get("/users/me").build().unwrap();
        let err = pipeline.send(&request).await.unwrap_err();

        assert!(err.is_reauthentication());
        assert_eq!(transport.calls().len(), 3);
        assert_eq!(pipeline.refresh_count(), 1);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_reauthentication() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![
            RawResponse::new(401, ""),
            RawResponse::new(403, r#"{"message":"invalid refresh token"}"#),
        ]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let err = pipeline.send(&feed()).await.unwrap_err();

        assert_eq!(err, ClientError::ReauthenticationRequired);
        assert!(pipeline.credentials().get().await.is_none());
        assert_eq!(pipeline.refresh_phase().await, RefreshPhase::Idle);
    }

    #[tokio::test]
    async fn test_anonymous_401_is_plain_http_error() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::with(vec![RawResponse::new(
            401,
            r#"{"message":"Invalid credentials"}"#,
        )]);
        let pipeline = pipeline(&dir, transport.clone()).await;

        let login = RequestDescriptor::post("/auth/login")
            .without_refresh()
            .build()
            .unwrap();
        let err = pipeline.send(&login).await.unwrap_err();

        assert_eq!(err.status(), Some(401));
        assert_eq!(transport.calls(), vec![("POST /auth/login".to_string(), None)]);
        assert!(pipeline.credentials().get().await.is_some());
    }

    #[test]
    fn test_http_error_message_extraction() {
        let from_message = http_error(&RawResponse::new(400, r#"{"message":"bad"}"#));
        assert_eq!(from_message.to_string(), "HTTP 400: bad");

        let from_error = http_error(&RawResponse::new(404, r#"{"error":"missing"}"#));
        assert_eq!(from_error.to_string(), "HTTP 404: missing");

        let malformed = http_error(&RawResponse::new(502, "<html>gateway</html>"));
        assert_eq!(
            malformed,
            ClientError::Http {
                status: 502,
                message: GENERIC_ERROR_MESSAGE.to_string()
            }
        );

        let empty = http_error(&RawResponse::new(503, ""));
        assert_eq!(empty.status(), Some(503));
    }
}
