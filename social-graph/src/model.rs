//! Graph entities and the collections that hold them.
//!
//! Field names serialize in camelCase so stored JSON stays readable by every
//! other client of the shared store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three collections kept in the store, one JSON array per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKey {
    Connections,
    Feed,
    Recommendations,
}

impl CollectionKey {
    /// All collection keys, in load order.
    pub const ALL: [CollectionKey; 3] = [
        CollectionKey::Connections,
        CollectionKey::Feed,
        CollectionKey::Recommendations,
    ];

    /// Store key for this collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKey::Connections => "connections",
            CollectionKey::Feed => "feed",
            CollectionKey::Recommendations => "recommendations",
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An entity stored in exactly one collection.
pub trait CollectionEntity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Collection this entity type lives in.
    const COLLECTION: CollectionKey;

    /// Identifier, unique within the collection at insertion time.
    fn id(&self) -> &str;
}

/// A connection to another party, with an encrypted strength score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Opaque identifier
    pub id: String,
    /// Codec output for the connection score
    pub encrypted_score: String,
    /// Creation time, seconds since epoch
    pub timestamp: i64,
    /// Connected party, usually an address (not validated)
    pub target: String,
}

impl CollectionEntity for Connection {
    const COLLECTION: CollectionKey = CollectionKey::Connections;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A post in the feed, with encrypted engagement metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    /// Opaque identifier
    pub id: String,
    /// Plaintext post body
    pub content: String,
    /// Codec output for the engagement value
    pub encrypted_metrics: String,
    /// Creation time, seconds since epoch
    pub timestamp: i64,
}

impl CollectionEntity for FeedItem {
    const COLLECTION: CollectionKey = CollectionKey::Feed;

    fn id(&self) -> &str {
        &self.id
    }
}

/// A recommendation produced by an external scorer. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    /// Opaque identifier
    pub id: String,
    /// Plaintext score, expected 0-100
    pub score: f64,
    /// Why this was recommended
    pub reason: String,
}

impl CollectionEntity for Recommendation {
    const COLLECTION: CollectionKey = CollectionKey::Recommendations;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Everything loaded from the store in one pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphSnapshot {
    pub connections: Vec<Connection>,
    pub feed: Vec<FeedItem>,
    pub recommendations: Vec<Recommendation>,
}

impl GraphSnapshot {
    /// Encrypted field for an entity id, looking at connections then feed.
    pub fn encrypted_field(&self, id: &str) -> Option<&str> {
        self.connections
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.encrypted_score.as_str())
            .or_else(|| {
                self.feed
                    .iter()
                    .find(|f| f.id == id)
                    .map(|f| f.encrypted_metrics.as_str())
            })
    }
}

/// Counts and a short preview of the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSummary {
    pub connections: usize,
    pub posts: usize,
    pub recommendations: usize,
    /// Leading connection targets, shortened for display
    pub preview: Vec<String>,
}

impl GraphSummary {
    /// Characters of each target kept in the preview.
    pub const PREVIEW_CHARS: usize = 6;

    /// Summarize a snapshot, previewing at most `limit` connections.
    pub fn from_snapshot(snapshot: &GraphSnapshot, limit: usize) -> Self {
        Self {
            connections: snapshot.connections.len(),
            posts: snapshot.feed.len(),
            recommendations: snapshot.recommendations.len(),
            preview: snapshot
                .connections
                .iter()
                .take(limit)
                .map(|c| c.target.chars().take(Self::PREVIEW_CHARS).collect())
                .collect(),
        }
    }
}
