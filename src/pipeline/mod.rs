//! Pipeline Module
//!
//! Request descriptors, the authenticated request pipeline, and the
//! single-flight refresh flow it falls back on.

mod client;
mod descriptor;
mod refresh;

pub use client::{http_error, RequestPipeline};
pub use descriptor::{
    CachePolicy, Invalidation, Method, MultipartForm, RequestBody, RequestBuilder,
    RequestDescriptor,
};
pub use refresh::{RefreshCoordinator, RefreshPhase, REFRESH_PATH};
