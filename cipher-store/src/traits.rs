//! Core trait for key-value stores.
//!
//! This module defines the `KvStore` trait - the only seam between the
//! collection synchronizer and the remote contract.

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::types::{Versioned, WriteReceipt};

/// Core trait for key-value stores.
///
/// Reads never fail for a missing key: absence is an empty byte vector.
/// Writes are full replacements and may require an authenticated signer.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get the store identifier (e.g., contract address or base URL).
    fn id(&self) -> &str;

    /// Liveness check with no side effects.
    async fn is_available(&self) -> bool;

    /// Read the raw bytes for `key`, or an empty vector if unset.
    async fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Replace the value stored under `key`.
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt>;

    /// Read the value together with its version.
    ///
    /// Stores without versioning report `version: None`.
    async fn read_versioned(&self, key: &str) -> Result<Versioned> {
        Ok(Versioned::unversioned(self.read(key).await?))
    }

    /// Replace the value only if the stored version still equals `expected`.
    async fn write_conditional(
        &self,
        key: &str,
        _value: Vec<u8>,
        _expected: Option<u64>,
    ) -> Result<WriteReceipt> {
        Err(StoreError::Unsupported(format!(
            "conditional write on {} is not supported by {}",
            key,
            self.id()
        )))
    }
}
