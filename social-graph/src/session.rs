//! Session context and the canonical reveal challenge.
//!
//! Session parameters are produced once when a session starts and held for
//! its lifetime. They are never persisted; a reload derives a new session.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::wallet::{Wallet, WalletError};

const SECONDS_PER_DAY: i64 = 86_400;

/// Parameters a reveal challenge is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Session public key, `0x`-prefixed hex
    pub public_key: String,
    /// Contract the collections live under
    pub contract_address: String,
    /// Chain the wallet is connected to
    pub chain_id: u64,
    /// Session start, seconds since epoch
    pub started_at: i64,
    /// How long the parameters stay valid
    pub duration_days: u32,
}

impl SessionContext {
    /// Create a session from explicit parameters.
    pub fn new(
        public_key: impl Into<String>,
        contract_address: impl Into<String>,
        chain_id: u64,
        started_at: i64,
        duration_days: u32,
    ) -> Self {
        Self {
            public_key: public_key.into(),
            contract_address: contract_address.into(),
            chain_id,
            started_at,
            duration_days,
        }
    }

    /// Start a session for the connected wallet.
    ///
    /// The chain id comes from the wallet; the public key is freshly
    /// generated and the start time is now.
    pub async fn establish(
        wallet: &dyn Wallet,
        config: &SessionConfig,
    ) -> Result<Self, WalletError> {
        let chain_id = wallet.chain_id().await?;
        Ok(Self::new(
            generate_public_key(config.public_key_hex_len),
            config.contract_address.clone(),
            chain_id,
            chrono::Utc::now().timestamp(),
            config.duration_days,
        ))
    }

    /// End of the validity window, seconds since epoch.
    pub fn expires_at(&self) -> i64 {
        self.started_at + i64::from(self.duration_days) * SECONDS_PER_DAY
    }

    /// Whether the validity window has passed at `now`.
    ///
    /// Informational only; nothing in the reveal path enforces expiry.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    /// Canonical challenge text for this session.
    pub fn challenge(&self) -> String {
        build_challenge(
            &self.public_key,
            &self.contract_address,
            self.chain_id,
            self.started_at,
            self.duration_days,
        )
    }
}

/// Newline-delimited challenge embedding all five session fields.
pub fn build_challenge(
    public_key: &str,
    contract_address: &str,
    chain_id: u64,
    session_start: i64,
    duration_days: u32,
) -> String {
    format!(
        "publickey:{}\ncontractAddresses:{}\ncontractsChainId:{}\nstartTimestamp:{}\ndurationDays:{}",
        public_key, contract_address, chain_id, session_start, duration_days
    )
}

/// Random `0x`-prefixed hex string with `hex_len` digits.
pub fn generate_public_key(hex_len: usize) -> String {
    const DIGITS: &[u8; 16] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    let mut key = String::with_capacity(hex_len + 2);
    key.push_str("0x");
    for _ in 0..hex_len {
        key.push(DIGITS[rng.gen_range(0..16)] as char);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::LocalWallet;

    #[test]
    fn test_challenge_format() {
        let session = SessionContext::new("0xpk", "0xcontract", 11155111, 1_700_000_000, 30);
        assert_eq!(
            session.challenge(),
            "publickey:0xpk\ncontractAddresses:0xcontract\ncontractsChainId:11155111\nstartTimestamp:1700000000\ndurationDays:30"
        );
    }

    #[test]
    fn test_challenge_stable_within_session() {
        let session = SessionContext::new("0xpk", "0xc", 1, 42, 7);
        assert_eq!(session.challenge(), session.challenge());
        assert_eq!(session.challenge().lines().count(), 5);
    }

    #[test]
    fn test_expiry_window() {
        let session = SessionContext::new("0xpk", "0xc", 1, 1_000, 1);
        assert_eq!(session.expires_at(), 1_000 + 86_400);
        assert!(!session.is_expired(1_000));
        assert!(session.is_expired(1_000 + 86_400));
    }

    #[test]
    fn test_generated_public_key_shape() {
        let key = generate_public_key(2000);
        assert_eq!(key.len(), 2002);
        assert!(key.starts_with("0x"));
        assert!(key[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_establish_uses_wallet_chain() {
        let wallet = LocalWallet::generate(31337);
        let config = SessionConfig {
            contract_address: "0xcontract".into(),
            duration_days: 14,
            public_key_hex_len: 16,
        };

        let session = SessionContext::establish(&wallet, &config).await.unwrap();
        assert_eq!(session.chain_id, 31337);
        assert_eq!(session.contract_address, "0xcontract");
        assert_eq!(session.duration_days, 14);
        assert_eq!(session.public_key.len(), 18);
    }

    #[tokio::test]
    async fn test_establish_requires_connection() {
        let wallet = LocalWallet::generate(1);
        wallet.set_connected(false);
        let result = SessionContext::establish(&wallet, &SessionConfig::default()).await;
        assert_eq!(result.unwrap_err(), WalletError::Disconnected);
    }
}
