//! Session Client
//!
//! Constructs the stores, transport and pipeline once per application
//! session and hands out the domain services built on them.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{CacheStats, ResponseCache};
use crate::config::Config;
use crate::credentials::{CredentialStore, FileSlotStorage, SlotStorage};
use crate::error::Result;
use crate::pipeline::RequestPipeline;
use crate::services::{AuthService, CommentService, PostService, UserService};
use crate::transport::{ReqwestTransport, Transport};

/// Entry point for UI collaborators. Cloning shares the same session.
#[derive(Clone)]
pub struct FeedClient {
    pipeline: Arc<RequestPipeline>,
    auth: AuthService,
    users: UserService,
    posts: PostService,
    comments: CommentService,
}

impl FeedClient {
    /// Builds a client talking HTTP to `config.api_url`, with credentials
    /// persisted at `config.credentials_path`.
    pub async fn new(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.api_url.clone(), config.request_timeout())?;
        let storage = FileSlotStorage::new(config.credentials_path.clone());
        Self::with_parts(config, Arc::new(transport), Arc::new(storage)).await
    }

    /// Builds a client over an injected transport and slot storage.
    pub async fn with_parts(
        config: &Config,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn SlotStorage>,
    ) -> Result<Self> {
        let credentials = CredentialStore::init(storage).await?;
        let cache = Arc::new(RwLock::new(ResponseCache::new(config.default_cache_ttl())));
        let pipeline = Arc::new(RequestPipeline::new(transport, credentials, cache));
        info!(api_url = %config.api_url, "feed client initialized");

        Ok(Self {
            auth: AuthService::new(pipeline.clone()),
            users: UserService::new(pipeline.clone()),
            posts: PostService::new(pipeline.clone(), config.feed_cache_ttl()),
            comments: CommentService::new(pipeline.clone()),
            pipeline,
        })
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn users(&self) -> &UserService {
        &self.users
    }

    pub fn posts(&self) -> &PostService {
        &self.posts
    }

    pub fn comments(&self) -> &CommentService {
        &self.comments
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.pipeline.cache_stats().await
    }

    /// Token exchanges performed this session.
    pub fn refresh_count(&self) -> u64 {
        self.pipeline.refresh_count()
    }

    pub fn credentials(&self) -> &CredentialStore {
        self.pipeline.credentials()
    }
}
