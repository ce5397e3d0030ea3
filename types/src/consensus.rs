//! Per-peer handshake results and the consensus config folded from them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::Timestamp;

/// Value a peer reports for key material it has not negotiated yet.
pub const ERR_SENTINEL: &str = "ERR";

/// Hardware attestation report attached to a handshake response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationReport {
    #[serde(rename = "type")]
    pub kind: String,
    /// Base64 nonce; must equal the round challenge.
    pub noonce: String,
    /// Base64 values keyed by name (`INSTANCE_ID`, `EXTERNAL_ADDR`, ...).
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Base64 signatures; the last one is the signature over the report itself.
    #[serde(default)]
    pub signatures: Vec<String>,
    /// Base64 hardware report.
    pub report: String,
}

/// Key material returned by a single peer during a handshake round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerHandshakeResult {
    pub server_pub_key: String,
    pub subnet_pub_key: String,
    pub network_pub_key: String,
    pub network_pub_key_set: String,
    pub hd_root_pubkeys: Option<Vec<String>>,
    pub latest_blockhash: Option<String>,
    pub attestation: Option<AttestationReport>,
}

impl PeerHandshakeResult {
    /// Whether any key field still carries the [`ERR_SENTINEL`].
    pub fn has_unnegotiated_keys(&self) -> bool {
        [
            &self.server_pub_key,
            &self.subnet_pub_key,
            &self.network_pub_key,
            &self.network_pub_key_set,
        ]
        .iter()
        .any(|k| k.as_str() == ERR_SENTINEL)
    }

    /// The reported blockhash, if it is non-empty.
    pub fn usable_blockhash(&self) -> Option<&str> {
        self.latest_blockhash
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
    }
}

/// Network-wide values agreed on by the majority of responding peers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusConfig {
    pub subnet_pub_key: String,
    pub network_pub_key: String,
    pub network_pub_key_set: String,
    pub hd_root_pubkeys: Vec<String>,
    pub latest_blockhash: String,
    pub last_blockhash_retrieved_at: Timestamp,
}
