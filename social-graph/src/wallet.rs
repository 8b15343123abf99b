//! Wallet collaborator boundary.
//!
//! The wallet owns the user's key and is the only component that can sign.
//! `LocalWallet` is an Ed25519 implementation for local use and tests; a
//! browser or hardware wallet plugs in behind the same trait.

use async_trait::async_trait;
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tracing::debug;

/// Error types for wallet operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// User declined the signature prompt
    #[error("user rejected signature request")]
    UserRejected,

    /// No account connected
    #[error("wallet not connected")]
    Disconnected,

    /// Anything else the wallet reports
    #[error("wallet failure: {0}")]
    Failed(String),
}

/// Wallet operations the core relies on.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Connected account address, if any.
    async fn address(&self) -> Option<String>;

    /// Whether an account is connected.
    async fn is_connected(&self) -> bool;

    /// Ask the user to sign `text`. Returns the hex signature.
    async fn sign_message(&self, text: &str) -> Result<String, WalletError>;

    /// Chain the wallet is connected to.
    async fn chain_id(&self) -> Result<u64, WalletError>;

    /// Counter that changes every time the wallet connects.
    ///
    /// Lets callers tell a reconnect of the same account from an
    /// uninterrupted connection. Wallets that cannot report it return 0.
    async fn connection_epoch(&self) -> u64 {
        0
    }
}

/// Ed25519 wallet held in process memory.
pub struct LocalWallet {
    key: SigningKey,
    chain_id: u64,
    connected: AtomicBool,
    epoch: AtomicU64,
    decline: AtomicBool,
    prompts: AtomicU32,
}

impl LocalWallet {
    /// Create a connected wallet with a fresh key.
    pub fn generate(chain_id: u64) -> Self {
        Self::from_key(SigningKey::generate(&mut OsRng), chain_id)
    }

    /// Create a connected wallet from existing key bytes.
    pub fn from_bytes(secret: &[u8; 32], chain_id: u64) -> Self {
        Self::from_key(SigningKey::from_bytes(secret), chain_id)
    }

    fn from_key(key: SigningKey, chain_id: u64) -> Self {
        Self {
            key,
            chain_id,
            connected: AtomicBool::new(true),
            epoch: AtomicU64::new(1),
            decline: AtomicBool::new(false),
            prompts: AtomicU32::new(0),
        }
    }

    /// Address derived from the verifying key: `0x` + hex.
    pub fn address_string(&self) -> String {
        format!("0x{}", hex::encode(self.key.verifying_key().to_bytes()))
    }

    /// Connect or disconnect the account. Each fresh connect starts a new
    /// connection epoch.
    pub fn set_connected(&self, connected: bool) {
        let was_connected = self.connected.swap(connected, Ordering::SeqCst);
        if connected && !was_connected {
            self.epoch.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Make the user decline (or accept) subsequent prompts.
    pub fn set_decline(&self, decline: bool) {
        self.decline.store(decline, Ordering::SeqCst);
    }

    /// Number of signature prompts shown.
    pub fn prompt_count(&self) -> u32 {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Wallet for LocalWallet {
    async fn address(&self) -> Option<String> {
        self.connected
            .load(Ordering::SeqCst)
            .then(|| self.address_string())
    }

    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn sign_message(&self, text: &str) -> Result<String, WalletError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::Disconnected);
        }

        self.prompts.fetch_add(1, Ordering::SeqCst);
        if self.decline.load(Ordering::SeqCst) {
            debug!("Signature prompt declined");
            return Err(WalletError::UserRejected);
        }

        let signature = self.key.sign(text.as_bytes());
        Ok(hex::encode(signature.to_bytes()))
    }

    async fn chain_id(&self) -> Result<u64, WalletError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WalletError::Disconnected);
        }
        Ok(self.chain_id)
    }

    async fn connection_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }
}

/// Checks a signature against the signing address.
pub trait SignatureVerifier: Send + Sync {
    /// Whether `signature` over `message` was produced by `address`.
    fn verify(&self, address: &str, message: &str, signature: &str) -> bool;
}

/// Verifies Ed25519 signatures from `0x`-hex addresses.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, address: &str, message: &str, signature: &str) -> bool {
        let Ok(key_bytes) = hex::decode(address.trim_start_matches("0x")) else {
            return false;
        };
        let Ok(key_bytes) = <[u8; 32]>::try_from(key_bytes.as_slice()) else {
            return false;
        };
        let Ok(key) = VerifyingKey::from_bytes(&key_bytes) else {
            return false;
        };
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&sig_bytes) else {
            return false;
        };
        key.verify_strict(message.as_bytes(), &signature).is_ok()
    }
}

/// Accepts any non-empty signature.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SignatureVerifier for AcceptAll {
    fn verify(&self, _address: &str, _message: &str, signature: &str) -> bool {
        !signature.is_empty()
    }
}
