//! Types shared by store implementations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// HTTP store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpStoreConfig {
    /// Base URL of the key-value gateway
    pub base_url: String,
    /// Namespace (contract) the keys live under
    pub namespace: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            namespace: "social".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

/// Outcome of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    /// Key that was replaced
    pub key: String,
    /// Transaction identifier reported by the store
    pub tx_id: String,
    /// Number of bytes written
    pub bytes_written: usize,
    /// Version of the value after the write, when the store tracks one
    pub version: Option<u64>,
    /// When the write was accepted
    pub written_at: DateTime<Utc>,
}

impl WriteReceipt {
    /// Create a receipt with a fresh transaction id.
    pub fn new(key: impl Into<String>, bytes_written: usize) -> Self {
        Self {
            key: key.into(),
            tx_id: uuid::Uuid::new_v4().to_string(),
            bytes_written,
            version: None,
            written_at: Utc::now(),
        }
    }

    /// Attach the post-write version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }
}

/// Value read together with its version.
///
/// `version` is `None` for keys that were never written, or for stores that
/// do not track versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Versioned {
    /// Raw bytes (empty when unset)
    pub bytes: Vec<u8>,
    /// Monotonic write counter for the key
    pub version: Option<u64>,
}

impl Versioned {
    /// Wrap bytes without version information.
    pub fn unversioned(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            version: None,
        }
    }
}
