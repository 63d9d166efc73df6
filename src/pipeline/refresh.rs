//! Refresh Flow Module
//!
//! Single-flight access-token renewal.
//!
//! ```text
//! IDLE --401--> REFRESHING --exchange ok--> SUCCEEDED --> IDLE
//!                          \--exchange err-> FAILED ----> IDLE
//! ```
//!
//! Entry into REFRESHING is a check-and-set under the state lock, so
//! concurrent 401s attach to the in-flight exchange instead of starting a
//! second one. The exchange runs on its own task: a waiter that gives up
//! only drops its receiver and never cancels the renewal other waiters
//! depend on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::cache::ResponseCache;
use crate::credentials::CredentialStore;
use crate::error::{ClientError, Result};
use crate::models::RefreshResponse;
use crate::pipeline::RequestDescriptor;
use crate::transport::{ApiResponse, Transport};

/// Path of the token exchange endpoint.
pub const REFRESH_PATH: &str = "/auth/refresh-token";

// == Refresh Phase ==
/// Observable phase of the refresh state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Idle,
    Refreshing,
}

/// Terminal result of one exchange, shared with every waiter.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RefreshOutcome {
    Succeeded(String),
    Failed,
}

enum RefreshState {
    Idle,
    Refreshing(watch::Receiver<Option<RefreshOutcome>>),
}

// == Refresh Coordinator ==
/// Owns the refresh state machine for one session.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    transport: Arc<dyn Transport>,
    credentials: CredentialStore,
    cache: Arc<RwLock<ResponseCache>>,
    exchanges: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialStore,
        cache: Arc<RwLock<ResponseCache>>,
    ) -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            transport,
            credentials,
            cache,
            exchanges: AtomicU64::new(0),
        }
    }

    pub async fn phase(&self) -> RefreshPhase {
        match &*self.state.lock().await {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing(_) => RefreshPhase::Refreshing,
        }
    }

    /// Number of exchange calls sent to the backend so far.
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }

    // == Renew ==
    /// Returns an access token newer than `rejected`.
    ///
    /// If another caller already replaced `rejected`, the current token is
    /// returned without an exchange. Otherwise this joins the in-flight
    /// exchange or starts one. Fails with `ReauthenticationRequired` when
    /// the exchange fails.
    pub async fn renew(self: &Arc<Self>, rejected: Option<&str>) -> Result<String> {
        let mut receiver = {
            let mut state = self.state.lock().await;
            match &*state {
                RefreshState::Refreshing(receiver) => {
                    debug!("joining in-flight token refresh");
                    receiver.clone()
                }
                RefreshState::Idle => {
                    if let Some(current) = self.credentials.access_token().await {
                        if Some(current.as_str()) != rejected {
                            debug!("access token already renewed");
                            return Ok(current);
                        }
                    }

                    let (sender, receiver) = watch::channel(None);
                    *state = RefreshState::Refreshing(receiver.clone());
                    info!("token refresh started");

                    let coordinator = Arc::clone(self);
                    tokio::spawn(async move { coordinator.run(sender).await });
                    receiver
                }
            }
        };

        let outcome = receiver
            .wait_for(Option::is_some)
            .await
            .map(|outcome| outcome.clone())
            .map_err(|_| ClientError::ReauthenticationRequired)?;

        match outcome {
            Some(RefreshOutcome::Succeeded(token)) => Ok(token),
            _ => Err(ClientError::ReauthenticationRequired),
        }
    }

    /// Drives one exchange to completion and releases the waiters.
    async fn run(self: Arc<Self>, sender: watch::Sender<Option<RefreshOutcome>>) {
        let outcome = match self.exchange().await {
            Ok(refreshed) => {
                match self
                    .credentials
                    .update_tokens(&refreshed.token, refreshed.refresh_token.as_deref())
                    .await
                {
                    Ok(()) => {
                        info!("token refresh succeeded");
                        RefreshOutcome::Succeeded(refreshed.token)
                    }
                    Err(err) => {
                        warn!("failed to persist renewed token: {}", err);
                        self.end_session().await;
                        RefreshOutcome::Failed
                    }
                }
            }
            Err(err) => {
                warn!("token refresh failed: {}", err);
                self.end_session().await;
                RefreshOutcome::Failed
            }
        };

        // Back to IDLE and publish under the same lock, so no caller can
        // observe IDLE with a stale token and the result still pending.
        let mut state = self.state.lock().await;
        *state = RefreshState::Idle;
        let _ = sender.send(Some(outcome));
    }

    /// Exchanges the stored refresh token for a new access token.
    async fn exchange(&self) -> Result<RefreshResponse> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .await
            .ok_or(ClientError::ReauthenticationRequired)?;

        let request = RequestDescriptor::post(REFRESH_PATH)
            .json(json!({ "refreshToken": refresh_token }))
            .without_refresh()
            .build()?;

        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let raw = self.transport.execute(&request, None).await?;
        if !raw.is_success() {
            return Err(ClientError::Http {
                status: raw.status,
                message: "refresh token rejected".to_string(),
            });
        }
        ApiResponse::from_raw(&raw).json()
    }

    async fn end_session(&self) {
        if let Err(err) = self.credentials.clear().await {
            warn!("failed to persist credential clear: {}", err);
        }
        self.cache.write().await.clear();
    }
}
