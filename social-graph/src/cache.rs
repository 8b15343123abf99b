//! Per-session cache of revealed values.
//!
//! Presence of an id means "revealed". The cache is presentation state, not
//! a source of truth: it lives in memory only and is cleared whenever the
//! session that authorized its entries ends.
//!
//! Every clear starts a new generation. A reveal remembers the generation it
//! started in and its value is only kept if no clear happened meanwhile.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::debug;

use crate::reveal::{RevealError, RevealGate};
use crate::session::SessionContext;

/// Result of toggling an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ToggleOutcome {
    /// Entry was revealed and is now hidden
    Hidden,
    /// Entry was hidden and is now revealed
    Revealed(f64),
    /// Reveal did not go through; the cache is unchanged
    Denied(RevealError),
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    value: f64,
    generation: u64,
}

/// Mapping from entity id to revealed plaintext.
#[derive(Debug, Default)]
pub struct DecryptionCache {
    entries: DashMap<String, Entry>,
    generation: AtomicU64,
}

impl DecryptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hide `id` if revealed, otherwise reveal `token` through the gate.
    pub async fn toggle(
        &self,
        id: &str,
        token: &str,
        gate: &RevealGate,
        session: &SessionContext,
    ) -> ToggleOutcome {
        if self.hide(id) {
            debug!(id, "Hid revealed value");
            return ToggleOutcome::Hidden;
        }

        let generation = self.generation();
        match gate.request_reveal(session, token).await {
            Ok(value) if self.insert_if_current(id, value, generation) => {
                debug!(id, "Revealed value");
                ToggleOutcome::Revealed(value)
            }
            Ok(_) => {
                debug!(id, "Session ended during reveal, dropping value");
                ToggleOutcome::Denied(RevealError::SessionEnded)
            }
            Err(e) => ToggleOutcome::Denied(e),
        }
    }

    /// Hide `id` without touching the gate. Returns whether it was revealed.
    pub fn hide(&self, id: &str) -> bool {
        let current = self.generation();
        self.entries
            .remove(id)
            .is_some_and(|(_, entry)| entry.generation == current)
    }

    /// Revealed value for `id`.
    pub fn get(&self, id: &str) -> Option<f64> {
        let current = self.generation();
        self.entries
            .get(id)
            .filter(|entry| entry.generation == current)
            .map(|entry| entry.value)
    }

    pub fn is_revealed(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        let current = self.generation();
        self.entries
            .iter()
            .filter(|entry| entry.generation == current)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything and start a new generation. Called when the
    /// session ends; reveals still in flight will not be stored.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn insert_if_current(&self, id: &str, value: f64, generation: u64) -> bool {
        if self.generation() != generation {
            return false;
        }
        self.entries
            .insert(id.to_string(), Entry { value, generation });

        // A clear may have slipped in between the check and the insert
        if self.generation() != generation {
            self.entries
                .remove_if(id, |_, entry| entry.generation == generation);
            return false;
        }
        true
    }
}
