//! Signature-gated reveal of encrypted values.
//!
//! Every reveal re-signs the session challenge. There is no unlocked state
//! that outlives a request, so a disconnect takes effect on the very next
//! reveal. The signature is checked and then dropped; it is never stored.
//!
//! Each request walks its own state machine, observable through
//! [`RevealGate::request_reveal_observed`]. The gate-wide channel from
//! [`RevealGate::subscribe`] carries the latest transition of any request
//! and settles on `Idle` once no request is in flight.
//!
//! ```text
//! Idle ──▶ Signing ──▶ Signed ──▶ Decoding ──▶ Revealed
//!             │                       │
//!             ├──▶ Rejected ──▶ Idle  │
//!             └──▶ Failed ───▶ Idle ◀─┘
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::codec::ValueCodec;
use crate::config::RevealConfig;
use crate::session::SessionContext;
use crate::wallet::{AcceptAll, Ed25519Verifier, SignatureVerifier, Wallet, WalletError};

/// Where a reveal request currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevealState {
    #[default]
    Idle,
    Signing,
    Signed,
    Decoding,
    Revealed,
    Rejected,
    Failed,
}

/// Why a reveal produced no value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RevealError {
    /// No wallet connected; nothing was sent anywhere
    #[error("No wallet connected")]
    Unauthenticated,

    /// User declined the signature prompt
    #[error("Signature request rejected")]
    Rejected,

    /// Signing or verification failed
    #[error("Reveal failed: {0}")]
    Failed(String),

    /// Token decoded to no number
    #[error("Undecodable value: {0}")]
    Undecodable(String),

    /// The session that authorized the reveal ended before it completed
    #[error("Session ended during reveal")]
    SessionEnded,
}

/// Authorizes and performs decodes.
pub struct RevealGate {
    wallet: Arc<dyn Wallet>,
    codec: Arc<dyn ValueCodec>,
    verifier: Arc<dyn SignatureVerifier>,
    pacing: Duration,
    state: watch::Sender<RevealState>,
    in_flight: AtomicUsize,
}

impl RevealGate {
    /// Create a gate with no pacing delay and no signature verification.
    pub fn new(wallet: Arc<dyn Wallet>, codec: Arc<dyn ValueCodec>) -> Self {
        let (state, _) = watch::channel(RevealState::Idle);
        Self {
            wallet,
            codec,
            verifier: Arc::new(AcceptAll),
            pacing: Duration::ZERO,
            state,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Create a gate from configuration.
    pub fn from_config(
        wallet: Arc<dyn Wallet>,
        codec: Arc<dyn ValueCodec>,
        config: &RevealConfig,
    ) -> Self {
        let gate = Self::new(wallet, codec).with_pacing(config.pacing());
        if config.verify_signatures {
            gate.with_verifier(Arc::new(Ed25519Verifier))
        } else {
            gate
        }
    }

    /// Set the artificial decode delay.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the signature verifier.
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Watch transitions of all requests; `Idle` when none is in flight.
    pub fn subscribe(&self) -> watch::Receiver<RevealState> {
        self.state.subscribe()
    }

    /// Latest gate-wide state.
    pub fn state(&self) -> RevealState {
        *self.state.borrow()
    }

    /// Whether any reveal is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Sign the session challenge and, only on success, decode `token`.
    pub async fn request_reveal(
        &self,
        session: &SessionContext,
        token: &str,
    ) -> Result<f64, RevealError> {
        let (progress, _) = watch::channel(RevealState::Idle);
        self.request_reveal_observed(session, token, &progress).await
    }

    /// Like [`request_reveal`](Self::request_reveal), reporting this
    /// request's own transitions on `progress`.
    ///
    /// A successful request ends in `Revealed`; every failure after signing
    /// started ends in `Idle`.
    pub async fn request_reveal_observed(
        &self,
        session: &SessionContext,
        token: &str,
        progress: &watch::Sender<RevealState>,
    ) -> Result<f64, RevealError> {
        if !self.wallet.is_connected().await {
            warn!("Reveal requested without a connected wallet");
            return Err(RevealError::Unauthenticated);
        }
        let Some(address) = self.wallet.address().await else {
            return Err(RevealError::Unauthenticated);
        };

        let _guard = InFlight::enter(&self.in_flight, &self.state);
        self.transition(progress, RevealState::Signing);

        let challenge = session.challenge();
        let signature = match self.wallet.sign_message(&challenge).await {
            Ok(signature) => signature,
            Err(WalletError::UserRejected) => {
                info!("Reveal signature rejected by user");
                return Err(self.abort(progress, RevealState::Rejected, RevealError::Rejected));
            }
            Err(WalletError::Disconnected) => {
                return Err(self.abort(
                    progress,
                    RevealState::Failed,
                    RevealError::Unauthenticated,
                ));
            }
            Err(e) => {
                warn!(error = %e, "Reveal signature failed");
                return Err(self.abort(
                    progress,
                    RevealState::Failed,
                    RevealError::Failed(e.to_string()),
                ));
            }
        };

        if !self.verifier.verify(&address, &challenge, &signature) {
            warn!(address = %address, "Reveal signature did not verify");
            return Err(self.abort(
                progress,
                RevealState::Failed,
                RevealError::Failed("signature did not verify".to_string()),
            ));
        }
        self.transition(progress, RevealState::Signed);

        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }

        self.transition(progress, RevealState::Decoding);
        match self.codec.decode(token) {
            Ok(value) => {
                self.transition(progress, RevealState::Revealed);
                Ok(value)
            }
            Err(e) => Err(self.abort(
                progress,
                RevealState::Failed,
                RevealError::Undecodable(e.to_string()),
            )),
        }
    }

    fn transition(&self, progress: &watch::Sender<RevealState>, next: RevealState) {
        debug!(state = ?next, "Reveal state");
        progress.send_replace(next);
        self.state.send_replace(next);
    }

    fn abort(
        &self,
        progress: &watch::Sender<RevealState>,
        terminal: RevealState,
        error: RevealError,
    ) -> RevealError {
        self.transition(progress, terminal);
        self.transition(progress, RevealState::Idle);
        error
    }
}

/// Tracks a reveal in flight. The last one out resets the gate to `Idle`.
struct InFlight<'a> {
    counter: &'a AtomicUsize,
    state: &'a watch::Sender<RevealState>,
}

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, state: &'a watch::Sender<RevealState>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter, state }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.send_replace(RevealState::Idle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::MarkerCodec;
    use crate::wallet::LocalWallet;

    fn session() -> SessionContext {
        SessionContext::new("0xpk", "0xcontract", 1, 1_700_000_000, 30)
    }

    fn gate(wallet: Arc<LocalWallet>) -> RevealGate {
        RevealGate::new(wallet, Arc::new(MarkerCodec::new()))
            .with_verifier(Arc::new(Ed25519Verifier))
    }

    #[tokio::test]
    async fn test_reveal_after_signature() {
        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = gate(wallet.clone());

        let (progress, request_state) = watch::channel(RevealState::Idle);
        let value = gate
            .request_reveal_observed(&session(), "FHE-NzU=", &progress)
            .await
            .unwrap();
        assert_eq!(value, 75.0);
        assert_eq!(*request_state.borrow(), RevealState::Revealed);
        assert_eq!(gate.state(), RevealState::Idle);
        assert_eq!(wallet.prompt_count(), 1);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_every_reveal_re_signs() {
        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = gate(wallet.clone());

        gate.request_reveal(&session(), "FHE-NzU=").await.unwrap();
        gate.request_reveal(&session(), "FHE-NzU=").await.unwrap();
        assert_eq!(wallet.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_unauthenticated_never_prompts() {
        let wallet = Arc::new(LocalWallet::generate(1));
        wallet.set_connected(false);
        let gate = gate(wallet.clone());

        let err = gate.request_reveal(&session(), "FHE-NzU=").await.unwrap_err();
        assert_eq!(err, RevealError::Unauthenticated);
        assert_eq!(wallet.prompt_count(), 0);
        assert_eq!(gate.state(), RevealState::Idle);
    }

    #[tokio::test]
    async fn test_rejected_signature_returns_to_idle() {
        let wallet = Arc::new(LocalWallet::generate(1));
        wallet.set_decline(true);
        let gate = gate(wallet.clone());
        let mut states = gate.subscribe();

        let err = gate.request_reveal(&session(), "FHE-NzU=").await.unwrap_err();
        assert_eq!(err, RevealError::Rejected);
        assert_eq!(gate.state(), RevealState::Idle);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), RevealState::Idle);
    }

    #[tokio::test]
    async fn test_unverifiable_signature_fails() {
        struct RejectAll;
        impl SignatureVerifier for RejectAll {
            fn verify(&self, _: &str, _: &str, _: &str) -> bool {
                false
            }
        }

        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = RevealGate::new(wallet, Arc::new(MarkerCodec::new()))
            .with_verifier(Arc::new(RejectAll));

        let err = gate.request_reveal(&session(), "FHE-NzU=").await.unwrap_err();
        assert!(matches!(err, RevealError::Failed(_)));
    }

    #[tokio::test]
    async fn test_undecodable_token() {
        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = gate(wallet);

        let err = gate.request_reveal(&session(), "garbage").await.unwrap_err();
        assert!(matches!(err, RevealError::Undecodable(_)));
        assert_eq!(gate.state(), RevealState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_delay_marks_busy() {
        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = Arc::new(gate(wallet).with_pacing(Duration::from_millis(1500)));

        let task = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.request_reveal(&session(), "FHE-NDI=").await })
        };

        // Let the task reach the pacing sleep
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(gate.is_busy());
        assert_eq!(gate.state(), RevealState::Signed);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(task.await.unwrap().unwrap(), 42.0);
        assert!(!gate.is_busy());
        assert_eq!(gate.state(), RevealState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reveals_track_their_own_state() {
        let wallet = Arc::new(LocalWallet::generate(1));
        let gate = gate(wallet.clone()).with_pacing(Duration::from_millis(1500));
        let session = session();

        let (first, first_state) = watch::channel(RevealState::Idle);
        let (second, second_state) = watch::channel(RevealState::Idle);

        let watch_midway = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert!(gate.is_busy());
            assert_eq!(*first_state.borrow(), RevealState::Signed);
            assert_eq!(*second_state.borrow(), RevealState::Signed);
        };

        let (a, b, ()) = tokio::join!(
            gate.request_reveal_observed(&session, "FHE-NzU=", &first),
            gate.request_reveal_observed(&session, "garbage", &second),
            watch_midway,
        );

        assert_eq!(a.unwrap(), 75.0);
        assert!(matches!(b, Err(RevealError::Undecodable(_))));
        assert_eq!(*first_state.borrow(), RevealState::Revealed);
        assert_eq!(*second_state.borrow(), RevealState::Idle);
        assert_eq!(gate.state(), RevealState::Idle);
        assert!(!gate.is_busy());
        assert_eq!(wallet.prompt_count(), 2);
    }
}
