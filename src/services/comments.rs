//! Comment operations

use std::sync::Arc;

use serde_json::json;

use crate::error::Result;
use crate::models::{Comment, CommentId, PostId};
use crate::pipeline::{RequestDescriptor, RequestPipeline};
use crate::services::validation::require_text;
use crate::services::{post_children_prefix, post_key, post_path, segment};

fn comment_path(post_id: &PostId, comment_id: &CommentId) -> String {
    format!("{}/comments/{}", post_path(post_id), segment(comment_id.as_str()))
}

/// Comments on a post. Every mutation drops the post's cached detail and
/// comment list.
#[derive(Clone)]
pub struct CommentService {
    pipeline: Arc<RequestPipeline>,
}

impl CommentService {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    /// Comments on a post. Cached.
    pub async fn get_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        require_text("post_id", post_id.as_str())?;
        let request = RequestDescriptor::get(format!("{}/comments", post_path(post_id)))
            .cached()
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    pub async fn add_comment(&self, post_id: &PostId, text: &str) -> Result<Comment> {
        require_text("post_id", post_id.as_str())?;
        let text = require_text("text", text)?;

        let request = RequestDescriptor::post(format!("{}/comments", post_path(post_id)))
            .json(json!({ "text": text }))
            .invalidates_key(post_key(post_id))
            .invalidates(post_children_prefix(post_id))
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    pub async fn delete_comment(&self, post_id: &PostId, comment_id: &CommentId) -> Result<()> {
        require_text("post_id", post_id.as_str())?;
        require_text("comment_id", comment_id.as_str())?;

        let request = RequestDescriptor::delete(comment_path(post_id, comment_id))
            .invalidates_key(post_key(post_id))
            .invalidates(post_children_prefix(post_id))
            .build()?;
        self.pipeline.send(&request).await?;
        Ok(())
    }

    /// Likes or unlikes a comment, returning the updated comment.
    pub async fn toggle_comment_like(
        &self,
        post_id: &PostId,
        comment_id: &CommentId,
    ) -> Result<Comment> {
        require_text("post_id", post_id.as_str())?;
        require_text("comment_id", comment_id.as_str())?;

        let request = RequestDescriptor::post(format!("{}/like", comment_path(post_id, comment_id)))
            .invalidates_key(post_key(post_id))
            .invalidates(post_children_prefix(post_id))
            .build()?;
        self.pipeline.send(&request).await?.json()
    }
}
