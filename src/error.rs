//! Error types for heading requests and their manager.

use crate::types::RequestId;
use thiserror::Error;

/// Main error type for manager and request operations.
///
/// This is distinct from [`ErrorReason`](crate::types::ErrorReason), which is
/// the failure delivered to request callbacks.
#[derive(Debug, Error)]
pub enum HeadingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for HeadingError {
    fn from(e: serde_json::Error) -> Self {
        HeadingError::Config(e.to_string())
    }
}

/// Result type for heading operations.
pub type Result<T> = std::result::Result<T, HeadingError>;
