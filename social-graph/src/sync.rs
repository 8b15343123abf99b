//! Collection synchronizer.
//!
//! Each collection is one JSON array under one store key. Appends follow a
//! strict read-modify-write cycle: read the current array, push locally,
//! replace the whole blob. There is no delta primitive.
//!
//! In the default last-write-wins mode, two appends that read the same
//! snapshot both write a full array and the later write silently drops the
//! earlier one's entity. Optimistic mode closes that gap for stores that
//! support conditional writes: the write carries the version that was read,
//! and a conflict triggers reload and re-apply.
//!
//! Stored bytes that are empty or fail to parse load as an empty collection.

use std::sync::Arc;

use cipher_store::KvStore;
use tracing::{debug, info, warn};

use crate::codec::{parse_numeric_prefix, ValueCodec};
use crate::config::{ConcurrencyMode, SyncConfig};
use crate::error::{GraphError, Result};
use crate::model::{
    CollectionEntity, CollectionKey, Connection, FeedItem, GraphSnapshot, Recommendation,
};
use crate::sources::{EngagementSource, IdSource, RandomEngagement};

/// Loads and appends to the three graph collections.
pub struct CollectionSync {
    store: Arc<dyn KvStore>,
    codec: Arc<dyn ValueCodec>,
    ids: Arc<dyn IdSource>,
    engagement: Arc<dyn EngagementSource>,
    config: SyncConfig,
}

impl CollectionSync {
    /// Create a synchronizer with default settings.
    pub fn new(store: Arc<dyn KvStore>, codec: Arc<dyn ValueCodec>) -> Self {
        let config = SyncConfig::default();
        Self {
            store,
            codec,
            ids: Arc::from(config.id_scheme.source()),
            engagement: Arc::new(RandomEngagement),
            config,
        }
    }

    /// Apply configuration, including the id scheme.
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.ids = Arc::from(config.id_scheme.source());
        self.config = config;
        self
    }

    /// Override the id source.
    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Override the engagement source used for new posts.
    pub fn with_engagement(mut self, engagement: Arc<dyn EngagementSource>) -> Self {
        self.engagement = engagement;
        self
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    pub fn codec(&self) -> &Arc<dyn ValueCodec> {
        &self.codec
    }

    /// Load all three collections.
    ///
    /// Only store failures propagate; unreadable content loads as empty.
    pub async fn load_all(&self) -> Result<GraphSnapshot> {
        let (connections, feed, recommendations) = futures::future::try_join3(
            self.load::<Connection>(),
            self.load::<FeedItem>(),
            self.load::<Recommendation>(),
        )
        .await?;

        debug!(
            connections = connections.len(),
            feed = feed.len(),
            recommendations = recommendations.len(),
            "Loaded graph"
        );

        Ok(GraphSnapshot {
            connections,
            feed,
            recommendations,
        })
    }

    /// Load one collection.
    pub async fn load<T: CollectionEntity>(&self) -> Result<Vec<T>> {
        let bytes = self.store.read(T::COLLECTION.as_str()).await?;
        Ok(decode_collection(T::COLLECTION, &bytes))
    }

    /// Create a connection and persist it.
    ///
    /// Non-finite scores are stored as 0.
    pub async fn append_connection(
        &self,
        target: impl Into<String>,
        plain_score: f64,
    ) -> Result<Connection> {
        let score = if plain_score.is_finite() { plain_score } else { 0.0 };
        let connection = Connection {
            id: self.ids.next_id(),
            encrypted_score: self.codec.encode(score),
            timestamp: chrono::Utc::now().timestamp(),
            target: target.into(),
        };
        self.append(connection).await
    }

    /// Create a post with an engagement value from the configured source.
    pub async fn append_feed_item(&self, content: impl Into<String>) -> Result<FeedItem> {
        let engagement = self.engagement.next_engagement();
        self.append_feed_item_with_metrics(content, engagement).await
    }

    /// Create a post with an explicit engagement value.
    pub async fn append_feed_item_with_metrics(
        &self,
        content: impl Into<String>,
        engagement: u32,
    ) -> Result<FeedItem> {
        let item = FeedItem {
            id: self.ids.next_id(),
            content: content.into(),
            encrypted_metrics: self.codec.encode(f64::from(engagement)),
            timestamp: chrono::Utc::now().timestamp(),
        };
        self.append(item).await
    }

    /// Append one entity to its collection and replace the stored array.
    pub async fn append<T: CollectionEntity>(&self, entity: T) -> Result<T> {
        match self.config.concurrency {
            ConcurrencyMode::LastWriteWins => self.append_blind(entity).await,
            ConcurrencyMode::Optimistic => self.append_checked(entity).await,
        }
    }

    async fn append_blind<T: CollectionEntity>(&self, entity: T) -> Result<T> {
        let key = T::COLLECTION;
        let mut items = self.load::<T>().await?;
        items.push(entity.clone());

        let bytes = serde_json::to_vec(&items)?;
        let receipt = self.store.write(key.as_str(), bytes).await?;

        info!(
            collection = %key,
            id = entity.id(),
            len = items.len(),
            tx_id = %receipt.tx_id,
            "Appended entity"
        );
        Ok(entity)
    }

    async fn append_checked<T: CollectionEntity>(&self, entity: T) -> Result<T> {
        let key = T::COLLECTION;
        let mut conflicts = 0;

        loop {
            let current = self.store.read_versioned(key.as_str()).await?;
            let mut items: Vec<T> = decode_collection(key, &current.bytes);
            items.push(entity.clone());

            let bytes = serde_json::to_vec(&items)?;
            match self
                .store
                .write_conditional(key.as_str(), bytes, current.version)
                .await
            {
                Ok(receipt) => {
                    info!(
                        collection = %key,
                        id = entity.id(),
                        len = items.len(),
                        version = ?receipt.version,
                        conflicts,
                        "Appended entity"
                    );
                    return Ok(entity);
                }
                Err(e) if e.is_conflict() && conflicts < self.config.max_conflict_retries => {
                    conflicts += 1;
                    warn!(collection = %key, conflicts, "Concurrent write detected, reloading");
                }
                Err(e) if e.is_conflict() => {
                    return Err(GraphError::Conflict(format!(
                        "{} changed {} times during append",
                        key,
                        conflicts + 1
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Parse stored bytes as a collection, degrading to empty.
pub fn decode_collection<T: CollectionEntity>(key: CollectionKey, bytes: &[u8]) -> Vec<T> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let text = match std::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            warn!(collection = %key, error = %e, "Malformed collection, treating as empty");
            return Vec::new();
        }
    };

    if text.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str(text) {
        Ok(items) => items,
        Err(e) => {
            warn!(collection = %key, error = %e, "Malformed collection, treating as empty");
            Vec::new()
        }
    }
}

/// Parse user-entered score text the lenient way: the longest numeric prefix,
/// or 0 when there is none or it is not finite.
pub fn parse_score(input: &str) -> f64 {
    parse_numeric_prefix(input).unwrap_or(0.0)
}
