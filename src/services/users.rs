//! User operations

use std::sync::Arc;

use crate::error::{ClientError, Result};
use crate::models::{FileUpload, Post, ProfileUpdate, User, UserId};
use crate::pipeline::{MultipartForm, RequestDescriptor, RequestPipeline};
use crate::services::validation::{require_text, validate_email, validate_profile_picture};
use crate::services::{posts_prefix, user_path, users_prefix};

/// Profile reads and updates, user search.
#[derive(Clone)]
pub struct UserService {
    pipeline: Arc<RequestPipeline>,
}

impl UserService {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Profile of the logged-in user. Cached.
    pub async fn get_my_profile(&self) -> Result<User> {
        let request = RequestDescriptor::get("/users/me").cached().build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// Profile of any user. Cached.
    pub async fn get_user_profile(&self, user_id: &UserId) -> Result<User> {
        require_text("user_id", user_id.as_str())?;
        let request = RequestDescriptor::get(user_path(user_id))
            .cached()
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// Updates profile fields and refreshes the stored snapshot.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(ClientError::validation("profile", "Nothing to update"));
        }
        if let Some(username) = &update.username {
            require_text("username", username)?;
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
        }

        let request = RequestDescriptor::put("/users/me")
            .json(serde_json::to_value(update)?)
            .invalidates(users_prefix())
            .build()?;
        let user: User = self.pipeline.send(&request).await?.json()?;
        self.pipeline.credentials().set_profile(&user).await?;
        Ok(user)
    }

    /// Uploads a new profile picture. Author avatars are embedded in posts,
    /// so cached posts are dropped as well.
    pub async fn update_profile_picture(&self, file: FileUpload) -> Result<User> {
        validate_profile_picture(&file)?;

        let request = RequestDescriptor::put("/users/me/profile-picture")
            .multipart(MultipartForm::new().file("image", file))
            .invalidates(users_prefix())
            .invalidates(posts_prefix())
            .build()?;
        let user: User = self.pipeline.send(&request).await?.json()?;
        self.pipeline.credentials().set_profile(&user).await?;
        Ok(user)
    }

    /// Posts written by a user. Not cached.
    pub async fn get_user_posts(&self, user_id: &UserId) -> Result<Vec<Post>> {
        require_text("user_id", user_id.as_str())?;
        let request = RequestDescriptor::get(format!("{}/posts", user_path(user_id))).build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// Searches users by name. Not cached.
    pub async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        let query = require_text("query", query)?;
        let request = RequestDescriptor::get("/users/search")
            .query("query", query)
            .build()?;
        self.pipeline.send(&request).await?.json()
    }
}
