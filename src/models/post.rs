//! Post models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{FileUpload, UserId, UserSummary};

/// Backend identifier of a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A post with its author populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: PostId,
    #[serde(rename = "userId")]
    pub author: UserSummary,
    #[serde(default)]
    pub text: String,
    /// Image URLs relative to the backend host
    #[serde(default)]
    pub images: Vec<String>,
    /// Ids of users who liked the post
    #[serde(default)]
    pub likes: Vec<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Post {
    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user: &UserId) -> bool {
        self.likes.contains(user)
    }
}

/// One page of the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub has_more: bool,
}

/// Pagination for `GET /posts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedQuery {
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl FeedQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// A post to publish: text plus 1 to 5 images.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub text: String,
    pub images: Vec<FileUpload>,
}

/// Changes to an existing post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostEdit {
    pub text: String,
    /// Newly uploaded images
    pub images: Vec<FileUpload>,
    /// URLs of existing images to keep
    pub keep_images: Vec<String>,
}
