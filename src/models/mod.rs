//! Domain models exchanged with the backend
//!
//! Wire shapes follow the backend's JSON: camelCase fields and `_id` ids.

pub mod auth;
pub mod comment;
pub mod post;
pub mod upload;
pub mod user;

// Re-export commonly used types
pub use auth::{LoginResponse, NewAccount, RefreshResponse};
pub use comment::{Comment, CommentId};
pub use post::{FeedPage, FeedQuery, NewPost, Post, PostEdit, PostId};
pub use upload::FileUpload;
pub use user::{ProfileUpdate, User, UserId, UserSummary};
