//! Error types for graph operations.

use cipher_store::StoreError;

use crate::wallet::WalletError;

/// Error types for graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// Operation needs a connected wallet
    #[error("No wallet connected")]
    Unauthenticated,

    /// User declined a signature or write authorization
    #[error("User rejected: {0}")]
    UserRejected(String),

    /// Store or network failure
    #[error("Remote failure: {0}")]
    RemoteFailure(String),

    /// Caller supplied unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Optimistic write kept losing to concurrent writers
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Collection could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wallet collaborator failed
    #[error("Wallet error: {0}")]
    Wallet(WalletError),
}

impl GraphError {
    /// Whether the user declined, as opposed to something breaking.
    pub fn is_rejection(&self) -> bool {
        matches!(self, GraphError::UserRejected(_))
    }

    /// Text shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            GraphError::Unauthenticated => "Connect wallet first".to_string(),
            GraphError::UserRejected(_) => "Transaction rejected".to_string(),
            GraphError::RemoteFailure(detail) => format!("Failed: {}", detail),
            GraphError::InvalidInput(detail) => format!("Failed: {}", detail),
            GraphError::Conflict(detail) => format!("Failed: {}", detail),
            GraphError::Serialization(e) => format!("Failed: {}", e),
            GraphError::Wallet(e) => format!("Failed: {}", e),
        }
    }
}

impl From<StoreError> for GraphError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UserRejected(msg) => GraphError::UserRejected(msg),
            StoreError::VersionConflict { .. } => GraphError::Conflict(e.to_string()),
            other => GraphError::RemoteFailure(other.to_string()),
        }
    }
}

impl From<WalletError> for GraphError {
    fn from(e: WalletError) -> Self {
        match e {
            WalletError::UserRejected => GraphError::UserRejected(e.to_string()),
            WalletError::Disconnected => GraphError::Unauthenticated,
            other => GraphError::Wallet(other),
        }
    }
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
