//! Credential Store Module
//!
//! Process-wide holder of the session's tokens, backed by durable slots.
//! Every change goes through one locked read-modify-save, so readers never
//! observe a half-applied login or a partially cleared session.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::credentials::{SlotStorage, Slots};
use crate::error::Result;
use crate::models::{User, UserId};

// == Slot Keys ==
/// Slot holding the short-lived access token
pub const ACCESS_TOKEN_SLOT: &str = "token";
/// Slot holding the refresh token
pub const REFRESH_TOKEN_SLOT: &str = "refreshToken";
/// Slot holding the advisory user snapshot as JSON
pub const USER_SLOT: &str = "user";

// == Credential ==
/// The token pair of the current session.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    /// Owner of the session, taken from the user snapshot when present
    pub subject: Option<UserId>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            subject: None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("subject", &self.subject)
            .finish()
    }
}

// == Credential Store ==
/// Shared, durable credential holder. Cloning shares the same slots.
#[derive(Clone)]
pub struct CredentialStore {
    slots: Arc<Mutex<Slots>>,
    storage: Arc<dyn SlotStorage>,
}

impl CredentialStore {
    // == Lifecycle ==
    /// Loads persisted slots and returns the store.
    pub async fn init(storage: Arc<dyn SlotStorage>) -> Result<Self> {
        let slots = storage.load().await?;
        debug!(
            authenticated = slots.contains_key(ACCESS_TOKEN_SLOT),
            "credential store loaded"
        );
        Ok(Self {
            slots: Arc::new(Mutex::new(slots)),
            storage,
        })
    }

    /// Applies `change` to a copy of the slots, persists it, then commits.
    /// A failed save leaves the in-memory state untouched.
    async fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Slots),
    {
        let mut slots = self.slots.lock().await;
        let mut next = slots.clone();
        change(&mut next);
        self.storage.save(&next).await?;
        *slots = next;
        Ok(())
    }

    // == Get ==
    /// Returns the current token pair, if both tokens are present.
    pub async fn get(&self) -> Option<Credential> {
        let slots = self.slots.lock().await;
        let access_token = slots.get(ACCESS_TOKEN_SLOT)?.clone();
        let refresh_token = slots.get(REFRESH_TOKEN_SLOT)?.clone();
        let subject = slots
            .get(USER_SLOT)
            .and_then(|raw| serde_json::from_str::<User>(raw).ok())
            .map(|user| user.id);

        Some(Credential {
            access_token,
            refresh_token,
            subject,
        })
    }

    pub async fn access_token(&self) -> Option<String> {
        self.slots.lock().await.get(ACCESS_TOKEN_SLOT).cloned()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.slots.lock().await.get(REFRESH_TOKEN_SLOT).cloned()
    }

    /// Advisory user snapshot for UI bootstrap. Never used for authorization.
    pub async fn profile(&self) -> Option<User> {
        let slots = self.slots.lock().await;
        slots
            .get(USER_SLOT)
            .and_then(|raw| serde_json::from_str(raw).ok())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.slots.lock().await.contains_key(ACCESS_TOKEN_SLOT)
    }

    // == Set ==
    /// Replaces the token pair, keeping any user snapshot.
    pub async fn set(&self, credential: &Credential) -> Result<()> {
        self.update(|slots| {
            slots.insert(ACCESS_TOKEN_SLOT.to_string(), credential.access_token.clone());
            slots.insert(REFRESH_TOKEN_SLOT.to_string(), credential.refresh_token.clone());
        })
        .await
    }

    /// Writes the token pair and user snapshot together (login).
    pub async fn set_session(&self, credential: &Credential, profile: &User) -> Result<()> {
        let snapshot = serde_json::to_string(profile)?;
        self.update(|slots| {
            slots.insert(ACCESS_TOKEN_SLOT.to_string(), credential.access_token.clone());
            slots.insert(REFRESH_TOKEN_SLOT.to_string(), credential.refresh_token.clone());
            slots.insert(USER_SLOT.to_string(), snapshot);
        })
        .await?;
        info!(user = %profile.id, "session stored");
        Ok(())
    }

    /// Replaces the user snapshot only.
    pub async fn set_profile(&self, profile: &User) -> Result<()> {
        let snapshot = serde_json::to_string(profile)?;
        self.update(|slots| {
            slots.insert(USER_SLOT.to_string(), snapshot);
        })
        .await
    }

    /// Stores a renewed access token, and a rotated refresh token if given.
    pub async fn update_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<()> {
        self.update(|slots| {
            slots.insert(ACCESS_TOKEN_SLOT.to_string(), access_token.to_string());
            if let Some(refresh) = refresh_token {
                slots.insert(REFRESH_TOKEN_SLOT.to_string(), refresh.to_string());
            }
        })
        .await
    }

    // == Clear ==
    /// Removes all three slots.
    ///
    /// The in-memory session is dropped even if persisting the removal
    /// fails; the error is still returned.
    pub async fn clear(&self) -> Result<()> {
        let mut slots = self.slots.lock().await;
        slots.remove(ACCESS_TOKEN_SLOT);
        slots.remove(REFRESH_TOKEN_SLOT);
        slots.remove(USER_SLOT);
        let result = self.storage.save(&slots).await;
        info!("credentials cleared");
        result
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
