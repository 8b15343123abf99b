//! Transient status notifications.
//!
//! Holds at most one message. Success and error messages dismiss themselves
//! after a fixed interval; pending messages stay until replaced.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::StatusConfig;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Success,
    Error,
}

/// A notification as seen by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub message: String,
}

#[derive(Debug)]
struct Slot {
    status: StatusMessage,
    expires_at: Option<Instant>,
}

/// Single-slot notification board.
#[derive(Debug)]
pub struct StatusBoard {
    success_ttl: Duration,
    error_ttl: Duration,
    slot: Mutex<Option<Slot>>,
}

impl StatusBoard {
    pub fn new(config: &StatusConfig) -> Self {
        Self {
            success_ttl: Duration::from_millis(config.success_dismiss_ms),
            error_ttl: Duration::from_millis(config.error_dismiss_ms),
            slot: Mutex::new(None),
        }
    }

    /// Show a message that stays until replaced.
    pub fn pending(&self, message: impl Into<String>) {
        self.set(StatusKind::Pending, message.into(), None);
    }

    /// Show a success message.
    pub fn success(&self, message: impl Into<String>) {
        self.set(StatusKind::Success, message.into(), Some(self.success_ttl));
    }

    /// Show an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.set(StatusKind::Error, message.into(), Some(self.error_ttl));
    }

    /// Current message, if one is showing and has not expired.
    pub fn current(&self) -> Option<StatusMessage> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        let expired = slot
            .as_ref()
            .and_then(|s| s.expires_at)
            .is_some_and(|at| Instant::now() >= at);
        if expired {
            *slot = None;
        }
        slot.as_ref().map(|s| s.status.clone())
    }

    /// Dismiss immediately.
    pub fn dismiss(&self) {
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn set(&self, kind: StatusKind, message: String, ttl: Option<Duration>) {
        let slot = Slot {
            status: StatusMessage { kind, message },
            // An interval too long to represent never expires
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        };
        *self.slot.lock().unwrap_or_else(|e| e.into_inner()) = Some(slot);
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(&StatusConfig::default())
    }
}
