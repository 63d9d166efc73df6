//! Error types for the feed client
//!
//! Provides unified error handling using thiserror. Every failure surfaced
//! to callers is one of these variants; the routing layer branches on the
//! kind, never on the message text.

use thiserror::Error;

/// Message used when a failed response carries no readable explanation.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

// == Client Error Enum ==
/// Unified error type for the feed client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Local argument check failed; nothing was sent over the network
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Backend answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The request never produced an HTTP response
    #[error("Network error: {message}")]
    Network { message: String },

    /// The session is gone and the user must log in again
    #[error("Session expired, please log in again")]
    ReauthenticationRequired,

    /// Durable credential slots could not be read or written
    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A successful response did not have the expected shape
    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

impl ClientError {
    // == Constructors ==
    /// Builds a validation error for the named field.
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Builds a network error from any displayable cause.
    pub fn network(message: impl std::fmt::Display) -> Self {
        ClientError::Network {
            message: message.to_string(),
        }
    }

    /// Builds a storage error from any displayable cause.
    pub fn storage(message: impl std::fmt::Display) -> Self {
        ClientError::Storage {
            message: message.to_string(),
        }
    }

    // == Inspection ==
    /// Returns true when the caller should redirect to the login entry point.
    pub fn is_reauthentication(&self) -> bool {
        matches!(self, ClientError::ReauthenticationRequired)
    }

    /// Returns true for local validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode {
            message: err.to_string(),
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the feed client.
pub type Result<T> = std::result::Result<T, ClientError>;
