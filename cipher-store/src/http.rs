//! HTTP client for a remote key-value gateway
//!
//! Routes:
//! - `GET  {base}/kv/{namespace}/{key}` - raw bytes, `x-version` header, 404 when unset
//! - `PUT  {base}/kv/{namespace}/{key}` - full replacement, optional `If-Match`
//! - `GET  {base}/health` - liveness

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::traits::KvStore;
use crate::types::{HttpStoreConfig, Versioned, WriteReceipt};

/// Header carrying the per-key write counter.
pub const VERSION_HEADER: &str = "x-version";

/// HTTP-backed key-value store
///
/// # Example
///
/// ```rust,no_run
/// use cipher_store::{HttpStore, HttpStoreConfig, KvStore};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = HttpStore::new(HttpStoreConfig {
///     base_url: "http://localhost:8080".into(),
///     namespace: "social".into(),
///     ..Default::default()
/// })?;
///
/// let connections = store.read("connections").await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpStore {
    config: HttpStoreConfig,
    client: Client,
}

/// Acknowledgement body returned by the gateway on accepted writes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WriteAck {
    tx_id: Option<String>,
    version: Option<u64>,
}

impl HttpStore {
    /// Create a new HTTP store client
    pub fn new(config: HttpStoreConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| StoreError::Config(format!("invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    /// Get the configuration.
    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    fn key_url(&self, key: &str) -> String {
        format!(
            "{}/kv/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            urlencoding::encode(&self.config.namespace),
            urlencoding::encode(key)
        )
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.config.base_url.trim_end_matches('/'))
    }

    /// `expected` is `None` for a blind write, `Some(None)` for create-only.
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<Option<u64>>,
    ) -> Result<WriteReceipt> {
        let len = value.len();
        let mut request = self
            .client
            .put(self.key_url(key))
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(value);

        match expected {
            Some(Some(version)) => {
                request = request.header(header::IF_MATCH, version.to_string());
            }
            Some(None) => request = request.header(header::IF_NONE_MATCH, "*"),
            None => {}
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::UserRejected(body));
        }

        if status == StatusCode::PRECONDITION_FAILED {
            let actual = version_of(&response);
            return Err(StoreError::VersionConflict {
                key: key.to_string(),
                expected: expected.flatten(),
                actual,
            });
        }

        let response = self.check_status(response).await?;
        let header_version = version_of(&response);
        let body = response.bytes().await?;

        let mut receipt = WriteReceipt::new(key, len);
        match serde_json::from_slice::<WriteAck>(&body) {
            Ok(ack) => {
                if let Some(tx_id) = ack.tx_id {
                    receipt.tx_id = tx_id;
                }
                receipt.version = ack.version.or(header_version);
            }
            Err(_) => receipt.version = header_version,
        }

        debug!(key, bytes = len, tx_id = %receipt.tx_id, "Gateway accepted write");
        Ok(receipt)
    }

    /// Map non-success statuses to a remote failure.
    async fn check_status(&self, response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        warn!(status, "Gateway returned error");
        Err(StoreError::Remote(format!("status {}: {}", status, body)))
    }
}

fn version_of(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl KvStore for HttpStore {
    fn id(&self) -> &str {
        &self.config.base_url
    }

    async fn is_available(&self) -> bool {
        match self.client.get(self.health_url()).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Health check failed");
                false
            }
        }
    }

    async fn read(&self, key: &str) -> Result<Vec<u8>> {
        Ok(self.read_versioned(key).await?.bytes)
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<WriteReceipt> {
        self.put(key, value, None).await
    }

    async fn read_versioned(&self, key: &str) -> Result<Versioned> {
        let response = self.client.get(self.key_url(key)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Versioned::default());
        }

        let response = self.check_status(response).await?;
        let version = version_of(&response);
        let bytes = response.bytes().await?.to_vec();

        Ok(Versioned { bytes, version })
    }

    async fn write_conditional(
        &self,
        key: &str,
        value: Vec<u8>,
        expected: Option<u64>,
    ) -> Result<WriteReceipt> {
        self.put(key, value, Some(expected)).await
    }
}
