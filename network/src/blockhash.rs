//! Latest-blockhash sources and the freshness cache in front of them.
//!
//! The indexer is asked first; when it fails or returns nothing, the
//! fallback RPC providers are tried in order for the block one below the
//! chain head.

use async_trait::async_trait;
use lit_types::{LitError, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::rpc;

pub const DEFAULT_BLOCKHASH_INDEXER_URL: &str =
    "https://block-indexer.litgateway.com/get_most_recent_valid_block";

/// Public Ethereum RPC endpoints used when the indexer is unavailable.
pub const FALLBACK_RPC_URLS: [&str; 3] = [
    "https://ethereum-rpc.publicnode.com",
    "https://eth.llamarpc.com",
    "https://eth.drpc.org",
];

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A blockhash and when it was obtained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockhashSample {
    pub blockhash: String,
    pub block_number: Option<u64>,
    pub retrieved_at: Timestamp,
}

#[async_trait]
pub trait BlockhashProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<BlockhashSample, LitError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexerResponse {
    #[serde(default)]
    blockhash: Option<String>,
    #[serde(default)]
    block_number: Option<u64>,
}

/// Indexer first, then each fallback RPC provider.
pub struct IndexerBlockhashProvider {
    http_client: reqwest::Client,
    indexer_url: Option<String>,
    rpc_urls: Vec<String>,
}

impl IndexerBlockhashProvider {
    pub fn new(indexer_url: Option<String>, rpc_urls: Vec<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            http_client,
            indexer_url,
            rpc_urls,
        }
    }

    async fn from_indexer(&self, url: &str) -> Result<BlockhashSample, LitError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| LitError::network(url, e.without_url().to_string()))?;
        if !response.status().is_success() {
            return Err(LitError::network(
                url,
                format!("HTTP status {}", response.status()),
            ));
        }
        let body: IndexerResponse = response.json().await.map_err(|e| {
            LitError::network(url, format!("invalid indexer response: {}", e.without_url()))
        })?;

        let blockhash = body
            .blockhash
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| LitError::network(url, "indexer returned no blockhash"))?;
        Ok(BlockhashSample {
            blockhash,
            block_number: body.block_number,
            retrieved_at: Timestamp::now(),
        })
    }

    async fn from_rpc(&self, url: &str) -> Result<BlockhashSample, LitError> {
        let head = rpc::block_number(&self.http_client, url).await?;

        let target = head.saturating_sub(1);
        let block = rpc::call(
            &self.http_client,
            url,
            "eth_getBlockByNumber",
            json!([format!("0x{target:x}"), false]),
        )
        .await?;
        let blockhash = block
            .get("hash")
            .and_then(Value::as_str)
            .ok_or_else(|| LitError::network(url, format!("block {target} has no hash")))?;

        Ok(BlockhashSample {
            blockhash: blockhash.to_string(),
            block_number: Some(target),
            retrieved_at: Timestamp::now(),
        })
    }
}

#[async_trait]
impl BlockhashProvider for IndexerBlockhashProvider {
    async fn fetch_latest(&self) -> Result<BlockhashSample, LitError> {
        if let Some(url) = &self.indexer_url {
            match self.from_indexer(url).await {
                Ok(sample) => return Ok(sample),
                Err(e) => tracing::warn!(url = %url, error = %e, "blockhash indexer failed, trying RPC providers"),
            }
        }

        for url in &self.rpc_urls {
            match self.from_rpc(url).await {
                Ok(sample) => return Ok(sample),
                Err(e) => tracing::error!(url = %url, error = %e, "RPC provider failed"),
            }
        }

        Err(LitError::InvalidEthBlockhash(
            "the indexer and every fallback RPC provider failed".into(),
        ))
    }
}

/// Cached blockhash with a freshness window.
///
/// Reads never wait on the network. Refreshes are single-flight: callers
/// arriving during a refresh wait for it and then reuse its result.
pub struct BlockhashCache {
    provider: Arc<dyn BlockhashProvider>,
    ttl_ms: u64,
    current: RwLock<Option<BlockhashSample>>,
    refresh: Mutex<()>,
}

impl BlockhashCache {
    pub fn new(provider: Arc<dyn BlockhashProvider>, ttl_ms: u64) -> Self {
        Self {
            provider,
            ttl_ms,
            current: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// Replace the cached value, e.g. with a handshake consensus blockhash.
    pub fn seed(&self, blockhash: impl Into<String>, retrieved_at: Timestamp) {
        self.store(BlockhashSample {
            blockhash: blockhash.into(),
            block_number: None,
            retrieved_at,
        });
    }

    pub fn current(&self) -> Option<BlockhashSample> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Whether the cached value is missing or older than the ttl.
    pub fn is_stale(&self, now: Timestamp) -> bool {
        self.fresh(now).is_none()
    }

    /// The cached blockhash if fresh, otherwise a refreshed one.
    ///
    /// A failed refresh falls back to the stale value when there is one.
    pub async fn get_or_refresh(&self, now: Timestamp) -> Result<String, LitError> {
        if let Some(blockhash) = self.fresh(now) {
            return Ok(blockhash);
        }

        let _refresh = self.refresh.lock().await;
        // Whoever held the refresh lock before us may have stored a fresh value.
        if let Some(blockhash) = self.fresh(now) {
            return Ok(blockhash);
        }

        match self.provider.fetch_latest().await {
            Ok(sample) => {
                let blockhash = sample.blockhash.clone();
                self.store(sample);
                Ok(blockhash)
            }
            Err(e) => match self.current() {
                Some(stale) => {
                    tracing::warn!(error = %e, age_ms = stale.retrieved_at.elapsed_since(now), "blockhash refresh failed, using stale value");
                    Ok(stale.blockhash)
                }
                None => Err(match e {
                    LitError::InvalidEthBlockhash(_) => e,
                    other => LitError::InvalidEthBlockhash(other.to_string()),
                }),
            },
        }
    }

    fn fresh(&self, now: Timestamp) -> Option<String> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|sample| !sample.retrieved_at.has_expired(self.ttl_ms, now))
            .map(|sample| sample.blockhash.clone())
    }

    fn store(&self, sample: BlockhashSample) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = Some(sample);
    }
}
