//! Social Graph - encrypted connections and posts over a shared key-value store
//!
//! Provides:
//! - A value codec that turns plaintext scores into opaque tokens
//! - Collection sync with load/append over any `KvStore`
//! - Signature-gated reveal of encrypted values
//! - A per-session cache of revealed values
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         SocialGraphService              │
//! │  (Main entry point for the UI layer)    │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────────┐
//! │ Collection  │       │ DecryptionCache │
//! │ Sync        │       │  └ RevealGate   │
//! └──────┬──────┘       └────────┬────────┘
//!        ▼                       ▼
//! ┌─────────────┐       ┌─────────────────┐
//! │ KvStore     │       │ Wallet +        │
//! │ (cipher-    │       │ ValueCodec      │
//! │  store)     │       │                 │
//! └─────────────┘       └─────────────────┘
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod reveal;
pub mod service;
pub mod session;
pub mod sources;
pub mod status;
pub mod sync;
pub mod wallet;

// Re-export main types for convenience
pub use cache::{DecryptionCache, ToggleOutcome};
pub use codec::{CodecError, MarkerCodec, ValueCodec, CODEC_MARKER};
pub use config::GraphConfig;
pub use error::{GraphError, Result};
pub use model::*;
pub use reveal::{RevealError, RevealGate, RevealState};
pub use service::SocialGraphService;
pub use session::SessionContext;
pub use sources::{EngagementSource, IdScheme, IdSource};
pub use status::{StatusBoard, StatusKind, StatusMessage};
pub use sync::CollectionSync;
pub use wallet::{Ed25519Verifier, LocalWallet, SignatureVerifier, Wallet, WalletError};
