//! In-process key-value store.
//!
//! Behaves like the remote contract (full replacement, empty on miss) and
//! can be told to refuse or fail writes, which makes it the store of choice
//! for tests.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::traits::KvStore;
use crate::types::{Versioned, WriteReceipt};

#[derive(Debug, Clone)]
struct Slot {
    bytes: Vec<u8>,
    version: u64,
}

/// In-memory store keyed by collection name.
pub struct MemoryStore {
    store_id: String,
    entries: DashMap<String, Slot>,
    available: AtomicBool,
    reject_writes: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    read_count: AtomicU32,
    write_count: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new(store_id: impl Into<String>) -> Self {
        Self {
            store_id: store_id.into(),
            entries: DashMap::new(),
            available: AtomicBool::new(true),
            reject_writes: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_reads: AtomicBool::new(false),
            read_count: AtomicU32::new(0),
            write_count: AtomicU32::new(0),
        }
    }

    /// Seed a key with raw bytes.
    pub fn with_entry(self, key: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(
            key.into(),
            Slot {
                bytes: bytes.into(),
                version: 1,
            },
        );
        self
    }

    /// Set availability.
    pub fn with_available(self, available: bool) -> Self {
        self.available.store(available, Ordering::SeqCst);
        self
    }

    /// Make subsequent writes fail as if the signer declined.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with a remote error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent reads fail with a remote error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Current raw value for a key, bypassing counters.
    pub fn snapshot(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).map(|slot| slot.bytes.clone())
    }

    /// Current version for a key.
    pub fn version(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|slot| slot.version)
    }

    /// Number of reads served.
    pub fn read_count(&self) -> u32 {
        self.read_count.load(Ordering::SeqCst)
    }

    /// Number of writes attempted.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::SeqCst)
    }

    fn check_write(&self, key: &str) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::UserRejected(format!(
                "user rejected transaction for {}",
                key
            )));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Remote(format!("write to {} failed", key)));
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn id(&self) -> &str {
        &self.store_id
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.read_versioned(key).await?.bytes)
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.check_write(key)?;

        let len = value.len();
        let version = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let slot = slot.get_mut();
                slot.bytes = value;
                slot.version += 1;
                slot.version
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    bytes: value,
                    version: 1,
                });
                1
            }
        };

        debug!(store = %self.store_id, key, bytes = len, version, "Wrote key");
        Ok(WriteReceipt::new(key, len).with_version(version))
    }

    async fn read_versioned(&self, key: &str) -> Result<Versioned> {
        self.read_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Remote(format!("read of {} failed", key)));
        }

        Ok(self
            .entries
            .get(key)
            .map(|slot| Versioned {
                bytes: slot.bytes.clone(),
                version: Some(slot.version),
            })
            .unwrap_or_default())
    }

    async fn write_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<u64>,
    ) -> Result<WriteReceipt> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.check_write(key)?;

        let len = value.len();
        // The entry guard holds the shard lock, so compare and swap is atomic.
        let version = match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                let actual = slot.get().version;
                if expected != Some(actual) {
                    return Err(StoreError::VersionConflict {
                        key: key.to_string(),
                        expected,
                        actual: Some(actual),
                    });
                }
                let slot = slot.get_mut();
                slot.bytes = value;
                slot.version += 1;
                slot.version
            }
            Entry::Vacant(vacant) => {
                if expected.is_some() {
                    return Err(StoreError::VersionConflict {
                        key: key.to_string(),
                        expected,
                        actual: None,
                    });
                }
                vacant.insert(Slot {
                    bytes: value,
                    version: 1,
                });
                1
            }
        };

        Ok(WriteReceipt::new(key, len).with_version(version))
    }
}
