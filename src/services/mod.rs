//! Domain Operations
//!
//! Thin typed wrappers over the request pipeline. Each operation validates
//! its arguments locally, builds a descriptor with the right cacheability
//! and invalidation prefixes, and sends it.

mod auth;
mod comments;
mod posts;
mod users;
pub mod validation;

pub use auth::AuthService;
pub use comments::CommentService;
pub use posts::PostService;
pub use users::UserService;

use url::form_urlencoded;

use crate::cache::CacheKey;
use crate::models::{PostId, UserId};
use crate::pipeline::Method;

// == Paths ==
/// Percent-encodes one path segment so an id cannot add segments or a
/// query to the request target.
pub(crate) fn segment(raw: &str) -> String {
    // `+` only ever stands for a space here; a literal plus is `%2B`
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

pub(crate) fn post_path(post_id: &PostId) -> String {
    format!("/posts/{}", segment(post_id.as_str()))
}

pub(crate) fn user_path(user_id: &UserId) -> String {
    format!("/users/{}", segment(user_id.as_str()))
}

// == Invalidation ==
/// Prefix covering every cached read of posts: feed pages, details and
/// comment lists.
pub(crate) fn posts_prefix() -> String {
    CacheKey::prefix(Method::Get, "/posts")
}

/// Key of one post's cached detail read.
pub(crate) fn post_key(post_id: &PostId) -> CacheKey {
    CacheKey::new(Method::Get, &post_path(post_id), &[])
}

/// Prefix covering one post's sub-resources, such as its comments.
pub(crate) fn post_children_prefix(post_id: &PostId) -> String {
    format!("{}/", CacheKey::prefix(Method::Get, &post_path(post_id)))
}

/// Prefix covering every cached read of user profiles.
pub(crate) fn users_prefix() -> String {
    CacheKey::prefix(Method::Get, "/users")
}
