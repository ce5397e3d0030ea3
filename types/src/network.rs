//! Network identifiers and their connection profiles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::LitError;

/// Peers of a locally running three-node network.
pub const LOCALHOST_BOOTSTRAP_URLS: [&str; 3] = [
    "http://127.0.0.1:7470",
    "http://127.0.0.1:7471",
    "http://127.0.0.1:7472",
];

/// RPC endpoint of the chain hosting the validator registry for hosted networks.
pub const CHRONICLE_YELLOWSTONE_RPC: &str = "https://yellowstone-rpc.litprotocol.com";

/// RPC endpoint of a local Anvil chain, used by custom deployments.
pub const LOCAL_ANVIL_RPC: &str = "http://127.0.0.1:8545";

/// Identifies which Lit network a client talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LitNetwork {
    /// Three nodes on the loopback interface.
    Localhost,
    /// Hosted development network.
    DatilDev,
    /// Hosted test network.
    DatilTest,
    /// Production network.
    Datil,
    /// A private deployment described by a custom contract context.
    Custom,
}

impl LitNetwork {
    /// Human-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Localhost => "localhost",
            Self::DatilDev => "datil-dev",
            Self::DatilTest => "datil-test",
            Self::Datil => "datil",
            Self::Custom => "custom",
        }
    }

    /// The default connection profile for this network.
    pub fn profile(&self) -> NetworkProfile {
        match self {
            Self::Localhost => NetworkProfile::Static(StaticProfile {
                network: *self,
                bootstrap_urls: LOCALHOST_BOOTSTRAP_URLS
                    .iter()
                    .map(|u| u.to_string())
                    .collect(),
                requires_attestation: false,
            }),
            Self::DatilDev => NetworkProfile::ChainResolved(ChainResolvedProfile {
                network: *self,
                rpc_url: CHRONICLE_YELLOWSTONE_RPC.to_string(),
                requires_attestation: false,
                centralisation: Centralisation::Centralised,
            }),
            Self::DatilTest | Self::Datil => {
                NetworkProfile::ChainResolved(ChainResolvedProfile {
                    network: *self,
                    rpc_url: CHRONICLE_YELLOWSTONE_RPC.to_string(),
                    requires_attestation: true,
                    centralisation: Centralisation::Decentralised,
                })
            }
            Self::Custom => NetworkProfile::ChainResolved(ChainResolvedProfile {
                network: *self,
                rpc_url: LOCAL_ANVIL_RPC.to_string(),
                requires_attestation: false,
                centralisation: Centralisation::Unknown,
            }),
        }
    }
}

impl fmt::Display for LitNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LitNetwork {
    type Err = LitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "localhost" => Ok(Self::Localhost),
            "datil-dev" => Ok(Self::DatilDev),
            "datil-test" => Ok(Self::DatilTest),
            "datil" => Ok(Self::Datil),
            "custom" => Ok(Self::Custom),
            other => Err(LitError::InvalidArgument(format!(
                "unsupported network \"{other}\"; expected one of localhost, datil-dev, datil-test, datil, custom"
            ))),
        }
    }
}

/// Whether a network's validators are operated by a single party.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Centralisation {
    Centralised,
    Decentralised,
    Unknown,
}

/// A network whose peer list is known ahead of time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticProfile {
    pub network: LitNetwork,
    pub bootstrap_urls: Vec<String>,
    pub requires_attestation: bool,
}

impl StaticProfile {
    /// Quorum size derived from the peer count.
    pub fn min_node_count(&self) -> usize {
        threshold_for(self.bootstrap_urls.len())
    }
}

/// A network whose peer list and quorum size are read from the validator registry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainResolvedProfile {
    pub network: LitNetwork,
    pub rpc_url: String,
    pub requires_attestation: bool,
    pub centralisation: Centralisation,
}

/// How a client learns its bootstrap peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkProfile {
    Static(StaticProfile),
    ChainResolved(ChainResolvedProfile),
}

impl NetworkProfile {
    pub fn network(&self) -> LitNetwork {
        match self {
            Self::Static(p) => p.network,
            Self::ChainResolved(p) => p.network,
        }
    }

    /// Whether handshakes must carry a verified attestation regardless of client settings.
    pub fn requires_attestation(&self) -> bool {
        match self {
            Self::Static(p) => p.requires_attestation,
            Self::ChainResolved(p) => p.requires_attestation,
        }
    }

    pub fn is_chain_resolved(&self) -> bool {
        matches!(self, Self::ChainResolved(_))
    }
}

/// Number of peers that must agree out of `node_count`.
///
/// Two thirds rounded up; a two-node network needs both nodes.
pub fn threshold_for(node_count: usize) -> usize {
    match node_count {
        0 => 0,
        2 => 2,
        n => (2 * n + 2) / 3,
    }
}
