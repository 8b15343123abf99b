//! Cipher Store - key-value client for shared graph collections
//!
//! The remote store is an opaque, un-versioned map from string keys to byte
//! blobs. Every write replaces the whole value for a key; there is no delta
//! primitive and no locking.
//!
//! - `KvStore` trait at the seam, so the synchronizer never depends on the
//!   transport
//! - `MemoryStore` for in-process use and tests
//! - `HttpStore` for a remote key-value gateway
//!
//! # Example
//!
//! ```rust,no_run
//! use cipher_store::{KvStore, MemoryStore};
//!
//! # async fn example() -> cipher_store::Result<()> {
//! let store = MemoryStore::new("local");
//! store.write("feed", b"[]".to_vec()).await?;
//! let bytes = store.read("feed").await?;
//! assert_eq!(bytes, b"[]");
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http;
pub mod memory;
pub mod traits;
pub mod types;

// Re-export main types
pub use error::{Result, StoreError};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use traits::KvStore;
pub use types::*;
