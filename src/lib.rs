//! Feed Client - authenticated access to the social feed backend
//!
//! Attaches credentials to every request, renews the access token once on
//! expiry with single-flight coordination, and serves idempotent reads from
//! a short-lived cache that mutations invalidate by prefix.

pub mod cache;
pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod transport;

pub use client::FeedClient;
pub use config::Config;
pub use error::{ClientError, Result};
