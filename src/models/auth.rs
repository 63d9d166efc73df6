//! Authentication payloads

use serde::{Deserialize, Serialize};

use crate::models::User;

/// Body of a successful `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Body of a successful `POST /auth/refresh-token`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    /// Present when the backend rotates refresh tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Registration form for `POST /auth/register`.
#[derive(Clone, PartialEq, Serialize)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for NewAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewAccount")
            .field("username", &self.username)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}
