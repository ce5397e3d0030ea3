//! Published connection state.

use lit_protocol::{socket_address, RequestId};
use lit_types::{ConsensusConfig, LitNetwork, PeerHandshakeResult, Timestamp};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything one completed connect round produced.
///
/// Published as a whole; readers never see a mix of two rounds.
#[derive(Clone, Debug)]
pub struct NetworkSnapshot {
    pub network: LitNetwork,
    pub min_node_count: usize,
    pub bootstrap_urls: Vec<String>,
    pub connected_peers: Vec<String>,
    /// Per-peer handshake results, kept for inspection.
    pub peer_results: BTreeMap<String, PeerHandshakeResult>,
    pub consensus: Arc<ConsensusConfig>,
    pub request_id: RequestId,
    pub connected_at: Timestamp,
}

impl NetworkSnapshot {
    /// Connected peers as `host:port`.
    pub fn node_set(&self) -> Vec<String> {
        self.connected_peers
            .iter()
            .map(|url| socket_address(url).to_string())
            .collect()
    }
}
