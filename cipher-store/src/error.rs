//! Error types for store operations

use thiserror::Error;

/// Store client error
#[derive(Debug, Error)]
pub enum StoreError {
    /// The signer declined to authorize a write
    #[error("User rejected: {0}")]
    UserRejected(String),

    /// The remote store failed for infrastructure reasons
    #[error("Remote failure: {0}")]
    Remote(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A conditional write lost against a concurrent writer
    #[error("Version conflict on {key}: expected {expected:?}, found {actual:?}")]
    VersionConflict {
        key: String,
        expected: Option<u64>,
        actual: Option<u64>,
    },

    /// The backend does not implement this operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Client could not be configured
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the failure came from the user declining authorization.
    ///
    /// Callers use this to pick a non-alarming message instead of a generic
    /// failure.
    pub fn is_rejection(&self) -> bool {
        matches!(self, StoreError::UserRejected(_))
    }

    /// Whether a conditional write should be retried after reloading.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
