//! Authentication operations

use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use crate::credentials::Credential;
use crate::error::Result;
use crate::models::{LoginResponse, NewAccount, User};
use crate::pipeline::{RequestDescriptor, RequestPipeline};
use crate::services::validation::{require_text, validate_email};

/// Login, registration and logout.
#[derive(Clone)]
pub struct AuthService {
    pipeline: Arc<RequestPipeline>,
}

impl AuthService {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Logs in and stores the token pair plus user snapshot.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let username = require_text("username", username)?;
        require_text("password", password)?;

        let request = RequestDescriptor::post("/auth/login")
            .json(json!({ "username": username, "password": password }))
            .without_refresh()
            .build()?;
        let login: LoginResponse = self.pipeline.send(&request).await?.json()?;

        let mut credential = Credential::new(login.token, login.refresh_token);
        credential.subject = Some(login.user.id.clone());

        // A new identity must not see the previous one's cached reads
        self.pipeline.clear_cache().await;
        self.pipeline
            .credentials()
            .set_session(&credential, &login.user)
            .await?;
        info!(user = %login.user.username, "logged in");
        Ok(login.user)
    }

    /// Creates an account. Does not log in.
    pub async fn register(&self, account: &NewAccount) -> Result<serde_json::Value> {
        require_text("username", &account.username)?;
        validate_email(&account.email)?;
        require_text("password", &account.password)?;

        let request = RequestDescriptor::post("/auth/register")
            .json(json!({
                "username": account.username.trim(),
                "email": account.email.trim(),
                "password": account.password,
            }))
            .without_refresh()
            .build()?;
        Ok(self.pipeline.send(&request).await?.body)
    }

    /// Tells the backend, then clears credentials and cache whatever the
    /// backend answered. The backend's error, if any, is still returned.
    pub async fn logout(&self) -> Result<()> {
        let request = RequestDescriptor::post("/auth/logout").build()?;
        let outcome = self.pipeline.send(&request).await.map(|_| ());
        if let Err(err) = &outcome {
            warn!("logout call failed: {}", err);
        }

        self.pipeline.clear_cache().await;
        self.pipeline.credentials().clear().await?;
        info!("logged out");

        // An already expired session is still a completed logout
        match outcome {
            Err(err) if err.is_reauthentication() => Ok(()),
            other => other,
        }
    }

    /// Advisory user snapshot stored at login; no network.
    pub async fn current_user(&self) -> Option<User> {
        self.pipeline.credentials().profile().await
    }

    /// Whether an access token is stored; no network.
    pub async fn is_authenticated(&self) -> bool {
        self.pipeline.credentials().is_authenticated().await
    }
}
