//! Post operations

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ClientError, Result};
use crate::models::{FeedPage, FeedQuery, NewPost, Post, PostEdit, PostId};
use crate::pipeline::{MultipartForm, RequestDescriptor, RequestPipeline};
use crate::services::{post_path, posts_prefix};
use crate::services::validation::{require_text, validate_post_images};

/// Feed, post lifecycle and likes.
#[derive(Clone)]
pub struct PostService {
    pipeline: Arc<RequestPipeline>,
    feed_ttl: Duration,
}

impl PostService {
    pub fn new(pipeline: Arc<RequestPipeline>, feed_ttl: Duration) -> Self {
        Self { pipeline, feed_ttl }
    }

    /// One page of the feed. Cached for the feed TTL.
    pub async fn get_all_posts(&self, query: FeedQuery) -> Result<FeedPage> {
        if query.page == 0 {
            return Err(ClientError::validation("page", "Pages start at 1"));
        }
        if query.limit == 0 {
            return Err(ClientError::validation("limit", "Limit must be positive"));
        }

        let request = RequestDescriptor::get("/posts")
            .query("page", query.page)
            .query("limit", query.limit)
            .cached_for(self.feed_ttl)
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// A single post. Cached.
    pub async fn get_post(&self, post_id: &PostId) -> Result<Post> {
        require_text("post_id", post_id.as_str())?;
        let request = RequestDescriptor::get(post_path(post_id))
            .cached()
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// Publishes a post with 1 to 5 images.
    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        let text = require_text("text", &post.text)?.to_string();
        validate_post_images(&post.images, 0)?;

        let mut form = MultipartForm::new().text("text", text);
        for image in post.images {
            form = form.file("images", image);
        }

        let request = RequestDescriptor::post("/posts")
            .multipart(form)
            .invalidates(posts_prefix())
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    /// Replaces a post's text and images. Kept images count toward the limit.
    pub async fn update_post(&self, post_id: &PostId, edit: PostEdit) -> Result<Post> {
        require_text("post_id", post_id.as_str())?;
        let text = require_text("text", &edit.text)?.to_string();
        validate_post_images(&edit.images, edit.keep_images.len())?;

        let mut form = MultipartForm::new().text("text", text);
        for url in edit.keep_images {
            form = form.text("keepImages", url);
        }
        for image in edit.images {
            form = form.file("images", image);
        }

        // The list prefix also covers the post's own detail entry
        let request = RequestDescriptor::put(post_path(post_id))
            .multipart(form)
            .invalidates(posts_prefix())
            .build()?;
        self.pipeline.send(&request).await?.json()
    }

    pub async fn delete_post(&self, post_id: &PostId) -> Result<()> {
        require_text("post_id", post_id.as_str())?;
        let request = RequestDescriptor::delete(post_path(post_id))
            .invalidates(posts_prefix())
            .build()?;
        self.pipeline.send(&request).await?;
        Ok(())
    }

    /// Likes or unlikes a post, returning the updated post.
    pub async fn toggle_like(&self, post_id: &PostId) -> Result<Post> {
        require_text("post_id", post_id.as_str())?;
        let request = RequestDescriptor::post(format!("{}/like", post_path(post_id)))
            .invalidates(posts_prefix())
            .build()?;
        self.pipeline.send(&request).await?.json()
    }
}
