//! Injectable sources for entity ids and engagement values.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

/// Produces entity identifiers.
pub trait IdSource: Send + Sync {
    /// Next identifier.
    fn next_id(&self) -> String;
}

/// Which id scheme to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Decimal epoch milliseconds, strictly increasing within a process
    #[default]
    EpochMillis,
    /// Random v4 UUIDs
    Uuid,
}

impl IdScheme {
    /// Build the source for this scheme.
    pub fn source(&self) -> Box<dyn IdSource> {
        match self {
            IdScheme::EpochMillis => Box::new(EpochMillisIds::new()),
            IdScheme::Uuid => Box::new(UuidIds),
        }
    }
}

/// Epoch-millisecond ids.
///
/// Two calls inside the same millisecond get `last + 1` instead of a
/// duplicate. Writers in other processes can still collide.
#[derive(Debug, Default)]
pub struct EpochMillisIds {
    last: AtomicI64,
}

impl EpochMillisIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for EpochMillisIds {
    fn next_id(&self) -> String {
        let now = chrono::Utc::now().timestamp_millis();
        let mut prev = self.last.load(Ordering::SeqCst);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange(prev, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next.to_string(),
                Err(actual) => prev = actual,
            }
        }
    }
}

/// Random UUID ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Supplies the engagement value attached to new posts.
pub trait EngagementSource: Send + Sync {
    /// Next engagement value.
    fn next_engagement(&self) -> u32;
}

/// Uniform draw from 0..=99.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomEngagement;

impl EngagementSource for RandomEngagement {
    fn next_engagement(&self) -> u32 {
        rand::thread_rng().gen_range(0..100)
    }
}

/// Always returns the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedEngagement(pub u32);

impl EngagementSource for FixedEngagement {
    fn next_engagement(&self) -> u32 {
        self.0
    }
}
