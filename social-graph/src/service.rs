//! SocialGraphService - main entry point for the presentation layer.
//!
//! Ties the synchronizer, wallet, reveal gate, cache and status board
//! together. Every failure is caught here and turned into a status message
//! as well as an error result; nothing leaves the graph partially updated.

use std::sync::Arc;

use cipher_store::KvStore;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::cache::{DecryptionCache, ToggleOutcome};
use crate::codec::{MarkerCodec, ValueCodec};
use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::model::{Connection, FeedItem, GraphSnapshot, GraphSummary};
use crate::reveal::{RevealError, RevealGate};
use crate::session::SessionContext;
use crate::sources::EngagementSource;
use crate::status::{StatusBoard, StatusMessage};
use crate::sync::{parse_score, CollectionSync};
use crate::wallet::Wallet;

/// Session bound to the wallet connection that started it.
#[derive(Debug, Clone)]
struct ActiveSession {
    account: String,
    epoch: u64,
    context: SessionContext,
}

impl ActiveSession {
    fn belongs_to(&self, identity: Option<&(String, u64)>) -> bool {
        identity.is_some_and(|(account, epoch)| *account == self.account && *epoch == self.epoch)
    }
}

/// Main entry point for graph operations.
pub struct SocialGraphService {
    config: GraphConfig,
    wallet: Arc<dyn Wallet>,
    sync: CollectionSync,
    gate: RevealGate,
    cache: DecryptionCache,
    status: StatusBoard,
    session: RwLock<Option<ActiveSession>>,
    snapshot: RwLock<GraphSnapshot>,
}

impl SocialGraphService {
    /// Create a service using the marker codec.
    pub fn new(store: Arc<dyn KvStore>, wallet: Arc<dyn Wallet>, config: GraphConfig) -> Self {
        Self::with_codec(store, wallet, Arc::new(MarkerCodec::new()), config)
    }

    /// Create a service with an explicit codec.
    pub fn with_codec(
        store: Arc<dyn KvStore>,
        wallet: Arc<dyn Wallet>,
        codec: Arc<dyn ValueCodec>,
        config: GraphConfig,
    ) -> Self {
        let sync = CollectionSync::new(store, Arc::clone(&codec)).with_config(config.sync.clone());
        let gate = RevealGate::from_config(Arc::clone(&wallet), codec, &config.reveal);
        let status = StatusBoard::new(&config.status);

        Self {
            config,
            wallet,
            sync,
            gate,
            cache: DecryptionCache::new(),
            status,
            session: RwLock::new(None),
            snapshot: RwLock::new(GraphSnapshot::default()),
        }
    }

    /// Override where post engagement values come from.
    pub fn with_engagement(mut self, engagement: Arc<dyn EngagementSource>) -> Self {
        self.sync = self.sync.with_engagement(engagement);
        self
    }

    /// Start the session, check the store and load the graph.
    pub async fn initialize(&self) {
        info!(store = %self.sync.store().id(), "Initializing SocialGraphService");

        match self.ensure_session().await {
            Ok(session) => debug!(chain_id = session.chain_id, "Session established"),
            Err(e) => debug!(error = %e, "No session yet"),
        }

        if self.sync.store().is_available().await {
            self.status.success("Store ready");
        }

        if let Err(e) = self.refresh().await {
            error!(error = %e, "Error loading data");
            self.status.error("Failed to load data");
        }
    }

    /// Reload all collections into the snapshot.
    pub async fn refresh(&self) -> Result<()> {
        let loaded = self.sync.load_all().await?;
        *self.snapshot.write().await = loaded;
        Ok(())
    }

    /// Latest loaded collections.
    pub async fn snapshot(&self) -> GraphSnapshot {
        self.snapshot.read().await.clone()
    }

    /// Counts and connection preview.
    pub async fn summary(&self) -> GraphSummary {
        GraphSummary::from_snapshot(
            &*self.snapshot.read().await,
            self.config.preview.graph_preview_limit,
        )
    }

    /// Current status message, if any.
    pub fn status(&self) -> Option<StatusMessage> {
        self.status.current()
    }

    pub fn cache(&self) -> &DecryptionCache {
        &self.cache
    }

    /// Revealed value for `id`, if the session that revealed it is still
    /// the wallet's current connection.
    pub async fn revealed_value(&self, id: &str) -> Option<f64> {
        self.observe_wallet().await;
        self.cache.get(id)
    }

    pub fn reveal_gate(&self) -> &RevealGate {
        &self.gate
    }

    /// Parameters of the active session.
    pub async fn session(&self) -> Option<SessionContext> {
        self.session.read().await.as_ref().map(|s| s.context.clone())
    }

    /// Add a connection from user input.
    ///
    /// Score text that does not parse is stored as 0.
    pub async fn add_connection(&self, target: &str, score_input: &str) -> Result<Connection> {
        self.observe_wallet().await;
        if self.wallet.address().await.is_none() {
            return Err(self.report(GraphError::Unauthenticated));
        }
        if target.trim().is_empty() {
            return Err(GraphError::InvalidInput("target is required".to_string()));
        }

        self.status.pending("Adding connection...");
        match self.sync.append_connection(target, parse_score(score_input)).await {
            Ok(connection) => {
                self.status.success("Connection added!");
                self.reload_after_write().await;
                Ok(connection)
            }
            Err(e) => Err(self.report(e)),
        }
    }

    /// Publish a post.
    pub async fn add_post(&self, content: &str) -> Result<FeedItem> {
        self.observe_wallet().await;
        if self.wallet.address().await.is_none() {
            return Err(self.report(GraphError::Unauthenticated));
        }
        if content.is_empty() {
            return Err(GraphError::InvalidInput("post content is empty".to_string()));
        }

        self.status.pending("Posting...");
        match self.sync.append_feed_item(content).await {
            Ok(item) => {
                self.status.success("Posted!");
                self.reload_after_write().await;
                Ok(item)
            }
            Err(e) => {
                warn!(error = %e, "Post failed");
                self.status.error("Post failed");
                Err(e)
            }
        }
    }

    /// Reveal or hide the encrypted field of a connection or post.
    pub async fn toggle_reveal(&self, id: &str) -> Result<ToggleOutcome> {
        self.observe_wallet().await;
        if self.cache.hide(id) {
            return Ok(ToggleOutcome::Hidden);
        }

        let token = self
            .snapshot
            .read()
            .await
            .encrypted_field(id)
            .map(str::to_string)
            .ok_or_else(|| GraphError::InvalidInput(format!("unknown entity {}", id)))?;

        let session = match self.ensure_session().await {
            Ok(session) => session,
            Err(GraphError::Unauthenticated) => {
                self.status.error(GraphError::Unauthenticated.user_message());
                return Ok(ToggleOutcome::Denied(RevealError::Unauthenticated));
            }
            Err(e) => return Err(self.report(e)),
        };

        let outcome = self.cache.toggle(id, &token, &self.gate, &session).await;
        if let ToggleOutcome::Denied(RevealError::Unauthenticated) = outcome {
            self.status.error(GraphError::Unauthenticated.user_message());
        }
        Ok(outcome)
    }

    /// Forget the session and everything it authorized.
    pub async fn end_session(&self) {
        *self.session.write().await = None;
        self.cache.clear();
        info!("Session ended");
    }

    /// End the session if the wallet disconnected, reconnected or switched
    /// account since it started. Revealed values go with it.
    pub async fn observe_wallet(&self) {
        let identity = self.wallet_identity().await;
        let mut guard = self.session.write().await;
        self.retire_stale(&mut *guard, identity.as_ref());
    }

    /// Current session, started (or restarted after a wallet change) as
    /// needed.
    async fn ensure_session(&self) -> Result<SessionContext> {
        let identity = self.wallet_identity().await;
        let mut guard = self.session.write().await;
        self.retire_stale(&mut *guard, identity.as_ref());

        let (account, epoch) = identity.ok_or(GraphError::Unauthenticated)?;
        if let Some(active) = guard.as_ref() {
            return Ok(active.context.clone());
        }

        let context = SessionContext::establish(self.wallet.as_ref(), &self.config.session).await?;
        *guard = Some(ActiveSession {
            account,
            epoch,
            context: context.clone(),
        });
        Ok(context)
    }

    /// Connected address and connection epoch, or `None` when disconnected.
    async fn wallet_identity(&self) -> Option<(String, u64)> {
        if !self.wallet.is_connected().await {
            return None;
        }
        let address = self.wallet.address().await?;
        Some((address, self.wallet.connection_epoch().await))
    }

    fn retire_stale(
        &self,
        session: &mut Option<ActiveSession>,
        identity: Option<&(String, u64)>,
    ) {
        let stale = session
            .as_ref()
            .is_some_and(|active| !active.belongs_to(identity));
        if stale {
            info!("Wallet connection changed, ending session");
            *session = None;
            self.cache.clear();
        }
    }

    async fn reload_after_write(&self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Reload after write failed");
        }
    }

    fn report(&self, e: GraphError) -> GraphError {
        if e.is_rejection() {
            info!("Write rejected by user");
        } else {
            warn!(error = %e, "Operation failed");
        }
        self.status.error(e.user_message());
        e
    }
}
