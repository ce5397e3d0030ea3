//! Client configuration with TOML file support.

use lit_network::{DEFAULT_BLOCKHASH_INDEXER_URL, FALLBACK_RPC_URLS};
use lit_types::{
    ContractContext, LitError, LitNetwork, NetworkProfile, RetryPolicy, StaticProfile,
};
use lit_utils::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a [`LitClient`](crate::LitClient).
///
/// Can be loaded from a TOML file via [`ClientConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Which network to connect to.
    #[serde(default = "default_network")]
    pub lit_network: LitNetwork,

    /// Explicit peers. When set, the network's own peer discovery is skipped.
    #[serde(default)]
    pub bootstrap_urls: Vec<String>,

    /// Quorum size override for static peer lists.
    #[serde(default)]
    pub min_node_count: Option<usize>,

    /// Upper bound for a whole handshake round.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Require verified attestation even on networks that do not demand it.
    #[serde(default)]
    pub check_node_attestation: bool,

    #[serde(default)]
    pub retry_policy: RetryPolicy,

    /// Log an alert when peers refuse a request as unauthorized.
    #[serde(default)]
    pub alert_when_unauthorized: bool,

    /// RPC endpoint of the validator registry chain, overriding the network default.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Contract addresses for custom deployments.
    #[serde(default)]
    pub contract_context: Option<ContractContext>,

    /// How often the cached blockhash is checked for staleness.
    #[serde(default = "default_blockhash_sync_interval_ms")]
    pub blockhash_sync_interval_ms: u64,

    #[serde(default = "default_blockhash_indexer_url")]
    pub blockhash_indexer_url: Option<String>,

    #[serde(default = "default_fallback_rpc_urls")]
    pub fallback_rpc_urls: Vec<String>,

    /// Wait after a validator set lock before re-reading the epoch.
    #[serde(default = "default_epoch_propagation_delay_ms")]
    pub epoch_propagation_delay_ms: u64,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Tracing filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_network() -> LitNetwork {
    LitNetwork::Custom
}

fn default_connect_timeout_ms() -> u64 {
    20_000
}

fn default_blockhash_sync_interval_ms() -> u64 {
    30_000
}

fn default_blockhash_indexer_url() -> Option<String> {
    Some(DEFAULT_BLOCKHASH_INDEXER_URL.to_string())
}

fn default_fallback_rpc_urls() -> Vec<String> {
    FALLBACK_RPC_URLS.iter().map(|u| u.to_string()).collect()
}

fn default_epoch_propagation_delay_ms() -> u64 {
    30_000
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl ClientConfig {
    pub fn for_network(network: LitNetwork) -> Self {
        Self {
            lit_network: network,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LitError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LitError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, LitError> {
        toml::from_str(s).map_err(|e| LitError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, LitError> {
        toml::to_string_pretty(self).map_err(|e| LitError::Config(e.to_string()))
    }

    /// Reject settings no connect round could work with.
    pub fn validate(&self) -> Result<(), LitError> {
        if self.connect_timeout_ms == 0 {
            return Err(LitError::InvalidArgument(
                "connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.blockhash_sync_interval_ms == 0 {
            return Err(LitError::InvalidArgument(
                "blockhash_sync_interval_ms must be greater than zero".into(),
            ));
        }
        if self.min_node_count == Some(0) {
            return Err(LitError::InvalidArgument(
                "min_node_count must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// The connection profile: explicit peers win over the network default.
    pub fn network_profile(&self) -> NetworkProfile {
        let mut profile = self.lit_network.profile();
        if !self.bootstrap_urls.is_empty() {
            return NetworkProfile::Static(StaticProfile {
                network: self.lit_network,
                bootstrap_urls: self.bootstrap_urls.clone(),
                requires_attestation: profile.requires_attestation(),
            });
        }
        if let (NetworkProfile::ChainResolved(p), Some(rpc_url)) = (&mut profile, &self.rpc_url) {
            p.rpc_url = rpc_url.clone();
        }
        profile
    }

    pub fn attestation_required(&self) -> bool {
        self.check_node_attestation || self.lit_network.profile().requires_attestation()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn blockhash_sync_interval(&self) -> Duration {
        Duration::from_millis(self.blockhash_sync_interval_ms)
    }

    pub fn epoch_propagation_delay(&self) -> Duration {
        Duration::from_millis(self.epoch_propagation_delay_ms)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            lit_network: default_network(),
            bootstrap_urls: Vec::new(),
            min_node_count: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            check_node_attestation: false,
            retry_policy: RetryPolicy::default(),
            alert_when_unauthorized: false,
            rpc_url: None,
            contract_context: None,
            blockhash_sync_interval_ms: default_blockhash_sync_interval_ms(),
            blockhash_indexer_url: default_blockhash_indexer_url(),
            fallback_rpc_urls: default_fallback_rpc_urls(),
            epoch_propagation_delay_ms: default_epoch_propagation_delay_ms(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}
