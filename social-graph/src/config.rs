//! Configuration for the social graph core.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::sources::IdScheme;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Session parameters
    pub session: SessionConfig,
    /// Reveal gate settings
    pub reveal: RevealConfig,
    /// Collection synchronizer settings
    pub sync: SyncConfig,
    /// Status notification timing
    pub status: StatusConfig,
    /// Graph preview settings
    pub preview: PreviewConfig,
}

impl GraphConfig {
    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

/// Session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Contract the collections live under
    pub contract_address: String,
    /// How long session parameters stay valid (days)
    pub duration_days: u32,
    /// Hex digits in the generated session public key
    pub public_key_hex_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            contract_address: String::new(),
            duration_days: 30,
            public_key_hex_len: 2000,
        }
    }
}

/// Reveal gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RevealConfig {
    /// Artificial wait between signature and decode (ms)
    pub pacing_ms: u64,
    /// Check signatures against the wallet address
    pub verify_signatures: bool,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            pacing_ms: 1500,
            verify_signatures: true,
        }
    }
}

impl RevealConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// How collection writes treat concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// Blind full replacement; the last write wins
    #[default]
    LastWriteWins,
    /// Conditional write on the version read, reload and retry on conflict
    Optimistic,
}

/// Synchronizer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrency policy for appends
    pub concurrency: ConcurrencyMode,
    /// Retries after a version conflict (optimistic mode only)
    pub max_conflict_retries: u32,
    /// Entity id scheme
    pub id_scheme: IdScheme,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::LastWriteWins,
            max_conflict_retries: 3,
            id_scheme: IdScheme::EpochMillis,
        }
    }
}

/// Status notification timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Success messages dismiss after this many ms
    pub success_dismiss_ms: u64,
    /// Error messages dismiss after this many ms
    pub error_dismiss_ms: u64,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            success_dismiss_ms: 2000,
            error_dismiss_ms: 3000,
        }
    }
}

/// Graph preview settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Connections shown in the graph preview
    pub graph_preview_limit: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            graph_preview_limit: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GraphConfig::default();
        assert_eq!(config.session.duration_days, 30);
        assert_eq!(config.reveal.pacing(), Duration::from_millis(1500));
        assert_eq!(config.sync.concurrency, ConcurrencyMode::LastWriteWins);
        assert_eq!(config.status.error_dismiss_ms, 3000);
        assert_eq!(config.preview.graph_preview_limit, 8);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
session:
  contract_address: "0xcontract"
sync:
  concurrency: optimistic
  id_scheme: uuid
"#;
        let config = GraphConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.session.contract_address, "0xcontract");
        assert_eq!(config.session.duration_days, 30);
        assert_eq!(config.sync.concurrency, ConcurrencyMode::Optimistic);
        assert_eq!(config.sync.id_scheme, IdScheme::Uuid);
        assert_eq!(config.sync.max_conflict_retries, 3);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = GraphConfig::default();
        config.reveal.pacing_ms = 0;
        let yaml = config.to_yaml().unwrap();
        let parsed = GraphConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.reveal.pacing_ms, 0);
    }
}
