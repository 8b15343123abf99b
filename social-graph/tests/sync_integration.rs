//! Graph sync integration tests
//!
//! Runs the service and synchronizer against an in-memory store:
//! - Add then reload round trips through the store
//! - Concurrent appends under last-write-wins and optimistic modes
//! - Recovery from corrupt or missing collections
//! - Reveal gating and session-scoped cache

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cipher_store::{KvStore, MemoryStore, Versioned, WriteReceipt};
use social_graph::config::{ConcurrencyMode, SyncConfig};
use social_graph::sources::FixedEngagement;
use social_graph::{
    CollectionSync, Connection, FeedItem, GraphConfig, LocalWallet, MarkerCodec, RevealError,
    SocialGraphService, StatusKind, ToggleOutcome, ValueCodec, Wallet, WalletError,
};
use tokio::sync::Barrier;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn test_config() -> GraphConfig {
    let mut config = GraphConfig::default();
    config.reveal.pacing_ms = 0;
    config.session.contract_address = "0xcontract".into();
    config.session.public_key_hex_len = 64;
    config
}

fn service_with(store: Arc<dyn KvStore>, wallet: Arc<dyn Wallet>) -> SocialGraphService {
    SocialGraphService::new(store, wallet, test_config())
        .with_engagement(Arc::new(FixedEngagement(33)))
}

// =============================================================================
// Test doubles
// =============================================================================

/// Holds the first two reads until both have happened, so concurrent
/// appends start from the same snapshot.
struct GatedStore {
    inner: MemoryStore,
    barrier: Barrier,
    gated_reads: AtomicUsize,
}

impl GatedStore {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            gated_reads: AtomicUsize::new(0),
        }
    }

    async fn pause(&self) {
        if self.gated_reads.fetch_add(1, Ordering::SeqCst) < 2 {
            self.barrier.wait().await;
        }
    }
}

#[async_trait]
impl KvStore for GatedStore {
    fn id(&self) -> &str {
        "gated"
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    async fn read(&self, key: &str) -> cipher_store::Result<Vec<u8>> {
        let bytes = self.inner.read(key).await?;
        self.pause().await;
        Ok(bytes)
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> cipher_store::Result<WriteReceipt> {
        self.inner.write(key, value).await
    }

    async fn read_versioned(&self, key: &str) -> cipher_store::Result<Versioned> {
        let current = self.inner.read_versioned(key).await?;
        self.pause().await;
        Ok(current)
    }

    async fn write_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<u64>,
    ) -> cipher_store::Result<WriteReceipt> {
        self.inner.write_conditional(key, value, expected).await
    }
}

/// Wallet that can switch between two accounts.
struct TwoAccountWallet {
    accounts: [LocalWallet; 2],
    active: AtomicUsize,
}

impl TwoAccountWallet {
    fn new() -> Self {
        Self {
            accounts: [LocalWallet::generate(1), LocalWallet::generate(1)],
            active: AtomicUsize::new(0),
        }
    }

    fn switch_to(&self, index: usize) {
        self.active.store(index, Ordering::SeqCst);
    }

    fn current(&self) -> &LocalWallet {
        &self.accounts[self.active.load(Ordering::SeqCst)]
    }
}

#[async_trait]
impl Wallet for TwoAccountWallet {
    async fn address(&self) -> Option<String> {
        self.current().address().await
    }

    async fn is_connected(&self) -> bool {
        self.current().is_connected().await
    }

    async fn sign_message(&self, text: &str) -> Result<String, WalletError> {
        self.current().sign_message(text).await
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        self.current().chain_id().await
    }

    async fn connection_epoch(&self) -> u64 {
        self.current().connection_epoch().await
    }
}

fn seed_feed(content: &str) -> String {
    serde_json::to_string(&vec![FeedItem {
        id: "1".into(),
        content: content.into(),
        encrypted_metrics: MarkerCodec.encode(5.0),
        timestamp: 1_700_000_000,
    }])
    .unwrap()
}

// =============================================================================
// Add & reload
// =============================================================================

#[tokio::test]
async fn test_add_connection_then_reload() {
    init_tracing();
    let store = Arc::new(MemoryStore::default());
    let service = service_with(store.clone(), Arc::new(LocalWallet::generate(1)));
    service.initialize().await;

    service.add_connection("0xabc", "75").await.unwrap();

    // A fresh synchronizer sees the same data
    let sync = CollectionSync::new(store, Arc::new(MarkerCodec));
    let connections = sync.load_all().await.unwrap().connections;
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].target, "0xabc");
    assert_eq!(MarkerCodec.decode(&connections[0].encrypted_score).unwrap(), 75.0);
}

#[tokio::test]
async fn test_appends_preserve_order() {
    let store = Arc::new(MemoryStore::default());
    let service = service_with(store, Arc::new(LocalWallet::generate(1)));

    for target in ["0x1", "0x2", "0x3"] {
        service.add_connection(target, "1").await.unwrap();
    }

    let targets: Vec<_> = service
        .snapshot()
        .await
        .connections
        .into_iter()
        .map(|c| c.target)
        .collect();
    assert_eq!(targets, vec!["0x1", "0x2", "0x3"]);
}

// =============================================================================
// Concurrent appends
// =============================================================================

#[tokio::test]
async fn test_concurrent_appends_last_write_wins() {
    init_tracing();
    let store = Arc::new(GatedStore::new(
        MemoryStore::default().with_entry("feed", seed_feed("A")),
    ));
    let sync = CollectionSync::new(store.clone(), Arc::new(MarkerCodec));

    let (b, c) = tokio::join!(sync.append_feed_item("B"), sync.append_feed_item("C"));
    b.unwrap();
    c.unwrap();

    let feed = sync.load::<FeedItem>().await.unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].content, "A");

    // Exactly one of the racing posts survives
    let survivors = feed[1..]
        .iter()
        .filter(|f| f.content == "B" || f.content == "C")
        .count();
    assert_eq!(survivors, 1);
}

#[tokio::test]
async fn test_concurrent_appends_optimistic_keeps_both() {
    let store = Arc::new(GatedStore::new(
        MemoryStore::default().with_entry("feed", seed_feed("A")),
    ));
    let config = SyncConfig {
        concurrency: ConcurrencyMode::Optimistic,
        ..SyncConfig::default()
    };
    let sync = CollectionSync::new(store.clone(), Arc::new(MarkerCodec)).with_config(config);

    let (b, c) = tokio::join!(sync.append_feed_item("B"), sync.append_feed_item("C"));
    b.unwrap();
    c.unwrap();

    let mut contents: Vec<_> = sync
        .load::<FeedItem>()
        .await
        .unwrap()
        .into_iter()
        .map(|f| f.content)
        .collect();
    assert_eq!(contents.len(), 3);
    contents.sort();
    assert_eq!(contents, vec!["A", "B", "C"]);
}

// =============================================================================
// Recovery
// =============================================================================

#[tokio::test]
async fn test_corrupt_collections_load_empty_and_recover() {
    init_tracing();
    let store = Arc::new(
        MemoryStore::default()
            .with_entry("connections", "not json")
            .with_entry("feed", vec![0xffu8, 0xfe])
            .with_entry("recommendations", "   "),
    );
    let service = service_with(store.clone(), Arc::new(LocalWallet::generate(1)));
    service.initialize().await;

    let snapshot = service.snapshot().await;
    assert!(snapshot.connections.is_empty());
    assert!(snapshot.feed.is_empty());
    assert!(snapshot.recommendations.is_empty());
    assert_ne!(service.status().unwrap().kind, StatusKind::Error);

    service.add_connection("0xabc", "10").await.unwrap();
    let stored: Vec<Connection> =
        serde_json::from_slice(&store.snapshot("connections").unwrap()).unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_store_failure_leaves_collection_untouched() {
    let store = Arc::new(MemoryStore::default().with_entry("feed", seed_feed("A")));
    let service = service_with(store.clone(), Arc::new(LocalWallet::generate(1)));
    service.initialize().await;

    store.set_fail_writes(true);
    service.add_post("B").await.unwrap_err();

    let feed: Vec<FeedItem> = serde_json::from_slice(&store.snapshot("feed").unwrap()).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(service.snapshot().await.feed.len(), 1);
}

// =============================================================================
// Reveal & cache
// =============================================================================

#[tokio::test]
async fn test_declined_reveal_leaves_value_hidden() {
    let store = Arc::new(MemoryStore::default());
    let wallet = Arc::new(LocalWallet::generate(1));
    let service = service_with(store, wallet.clone());
    let conn = service.add_connection("0xabc", "75").await.unwrap();

    wallet.set_decline(true);
    let outcome = service.toggle_reveal(&conn.id).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Denied(RevealError::Rejected));
    assert!(!service.cache().is_revealed(&conn.id));

    wallet.set_decline(false);
    let outcome = service.toggle_reveal(&conn.id).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Revealed(75.0));
}

#[tokio::test]
async fn test_toggle_twice_prompts_once() {
    let store = Arc::new(MemoryStore::default());
    let wallet = Arc::new(LocalWallet::generate(1));
    let service = service_with(store, wallet.clone());
    service.initialize().await;
    let post = service.add_post("hello").await.unwrap();

    assert_eq!(
        service.toggle_reveal(&post.id).await.unwrap(),
        ToggleOutcome::Revealed(33.0)
    );
    assert_eq!(
        service.toggle_reveal(&post.id).await.unwrap(),
        ToggleOutcome::Hidden
    );
    assert!(!service.cache().is_revealed(&post.id));
    assert_eq!(wallet.prompt_count(), 1);
}

#[tokio::test]
async fn test_reconnect_starts_fresh_session() {
    let store = Arc::new(MemoryStore::default());
    let wallet = Arc::new(LocalWallet::generate(1));
    let service = service_with(store, wallet.clone());
    service.initialize().await;

    let first = service.add_connection("0x1", "75").await.unwrap();
    let second = service.add_connection("0x2", "20").await.unwrap();
    service.toggle_reveal(&first.id).await.unwrap();
    let before = service.session().await.unwrap();

    // Same account drops and comes back without any call in between
    wallet.set_connected(false);
    wallet.set_connected(true);

    let outcome = service.toggle_reveal(&second.id).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Revealed(20.0));
    assert_eq!(service.revealed_value(&first.id).await, None);
    assert_eq!(service.revealed_value(&second.id).await, Some(20.0));
    assert_ne!(service.session().await.unwrap().public_key, before.public_key);
}

#[tokio::test]
async fn test_disconnect_hides_revealed_values() {
    let store = Arc::new(MemoryStore::default());
    let wallet = Arc::new(LocalWallet::generate(1));
    let service = service_with(store, wallet.clone());
    service.initialize().await;

    let conn = service.add_connection("0xabc", "75").await.unwrap();
    service.toggle_reveal(&conn.id).await.unwrap();

    wallet.set_connected(false);
    service.observe_wallet().await;
    assert!(!service.cache().is_revealed(&conn.id));
    assert!(service.session().await.is_none());

    wallet.set_connected(true);
    assert_eq!(service.revealed_value(&conn.id).await, None);
    assert_eq!(
        service.toggle_reveal(&conn.id).await.unwrap(),
        ToggleOutcome::Revealed(75.0)
    );
}

#[tokio::test]
async fn test_stored_non_numeric_token_is_not_revealed() {
    let stored = r#"[{"id":"c1","encryptedScore":"NaN","timestamp":0,"target":"0xabc"}]"#;
    let store = Arc::new(MemoryStore::default().with_entry("connections", stored));
    let service = service_with(store, Arc::new(LocalWallet::generate(1)));
    service.initialize().await;

    let outcome = service.toggle_reveal("c1").await.unwrap();
    assert!(matches!(
        outcome,
        ToggleOutcome::Denied(RevealError::Undecodable(_))
    ));
    assert!(!service.cache().is_revealed("c1"));
}

#[tokio::test]
async fn test_account_switch_clears_revealed_values() {
    let store = Arc::new(MemoryStore::default());
    let wallet = Arc::new(TwoAccountWallet::new());
    let service = service_with(store, wallet.clone());
    service.initialize().await;

    let first = service.add_connection("0x1", "10").await.unwrap();
    let second = service.add_connection("0x2", "20").await.unwrap();
    service.toggle_reveal(&first.id).await.unwrap();
    assert!(service.cache().is_revealed(&first.id));
    let before = service.session().await.unwrap();

    wallet.switch_to(1);
    let outcome = service.toggle_reveal(&second.id).await.unwrap();
    assert_eq!(outcome, ToggleOutcome::Revealed(20.0));

    assert!(!service.cache().is_revealed(&first.id));
    assert!(service.cache().is_revealed(&second.id));
    assert_ne!(service.session().await.unwrap().public_key, before.public_key);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_status_messages_dismiss() {
    let store = Arc::new(MemoryStore::default());
    let service = service_with(store.clone(), Arc::new(LocalWallet::generate(1)));

    service.add_post("hello").await.unwrap();
    assert_eq!(service.status().unwrap().message, "Posted!");

    tokio::time::advance(Duration::from_millis(2000)).await;
    assert!(service.status().is_none());

    store.set_reject_writes(true);
    service.add_connection("0xabc", "1").await.unwrap_err();
    assert_eq!(service.status().unwrap().message, "Transaction rejected");

    tokio::time::advance(Duration::from_millis(2000)).await;
    assert_eq!(service.status().unwrap().kind, StatusKind::Error);

    tokio::time::advance(Duration::from_millis(1000)).await;
    assert!(service.status().is_none());
}
