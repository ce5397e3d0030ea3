//! Handshake rounds against the bootstrap peer set.
//!
//! One challenge and one request id are shared by every peer of a round.
//! Peers answer `POST /web/handshake` concurrently; the round succeeds as
//! soon as `min_node_count` of them have answered (and, when required,
//! proved their attestation) and fails with `InitError` when the connect
//! timeout fires first.

use lit_protocol::codec;
use lit_protocol::{compose_url, Challenge, Endpoint, HandshakeRequest, HandshakeResponse, RequestId};
use lit_types::{ConsensusConfig, LitError, PeerHandshakeResult, Timestamp};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::quorum::race;
use crate::{fold_consensus, AttestationVerifier, NetworkMetrics, RequestDispatcher};

/// Parameters of one handshake round.
#[derive(Clone, Debug)]
pub struct HandshakeRound {
    pub bootstrap_urls: Vec<String>,
    pub min_node_count: usize,
    pub connect_timeout: Duration,
    pub attestation_required: bool,
}

/// Result of a successful round.
#[derive(Clone, Debug)]
pub struct HandshakeOutcome {
    pub request_id: RequestId,
    /// Peers that answered by the time quorum was reached, in bootstrap order.
    pub connected_peers: Vec<String>,
    pub peer_results: BTreeMap<String, PeerHandshakeResult>,
    pub consensus: ConsensusConfig,
}

pub struct HandshakeCoordinator {
    dispatcher: Arc<RequestDispatcher>,
    verifier: Arc<dyn AttestationVerifier>,
    metrics: Arc<NetworkMetrics>,
}

impl HandshakeCoordinator {
    pub fn new(
        dispatcher: Arc<RequestDispatcher>,
        verifier: Arc<dyn AttestationVerifier>,
        metrics: Arc<NetworkMetrics>,
    ) -> Self {
        Self {
            dispatcher,
            verifier,
            metrics,
        }
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub async fn handshake_all(&self, round: &HandshakeRound) -> Result<HandshakeOutcome, LitError> {
        let required = round.min_node_count;
        if round.bootstrap_urls.is_empty() {
            return Err(LitError::InvalidArgument(
                "bootstrap urls are empty; nothing to handshake with".into(),
            ));
        }
        if required == 0 || required > round.bootstrap_urls.len() {
            return Err(LitError::InvalidArgument(format!(
                "min node count {required} is not within 1..={}",
                round.bootstrap_urls.len()
            )));
        }

        self.metrics.handshake_rounds.inc();
        let request_id = RequestId::generate()?;
        let challenge = Challenge::generate()?;
        let body = serde_json::to_value(HandshakeRequest::new(&challenge))
            .map_err(|e| LitError::UnknownError(format!("encoding handshake request: {e}")))?;
        let connected = AtomicUsize::new(0);

        tracing::debug!(
            request_id = %request_id,
            peers = round.bootstrap_urls.len(),
            required,
            "starting handshake round"
        );

        let operations = round.bootstrap_urls.iter().enumerate().map(|(index, url)| {
            self.handshake_peer(
                index,
                url,
                &request_id,
                &challenge,
                &body,
                round.attestation_required,
                &connected,
            )
        });

        let mut successes =
            match tokio::time::timeout(round.connect_timeout, race(operations, required)).await {
                Ok(Ok(values)) => values,
                Ok(Err(failure)) => {
                    self.metrics.handshake_rounds_failed.inc();
                    tracing::error!(
                        request_id = %request_id,
                        connected = failure.successes,
                        required,
                        error = %failure.error,
                        "handshake round failed"
                    );
                    return Err(failure.error);
                }
                Err(_) => {
                    self.metrics.handshake_rounds_failed.inc();
                    let connected = connected.load(Ordering::SeqCst);
                    tracing::error!(
                        request_id = %request_id,
                        connected,
                        required,
                        "handshake round timed out"
                    );
                    return Err(LitError::InitError(format!(
                        "could not handshake with nodes after timeout of {}ms; \
                         could only connect to {connected} of {required} required nodes",
                        round.connect_timeout.as_millis()
                    )));
                }
            };

        successes.sort_by_key(|(index, _, _)| *index);
        let ordered: Vec<PeerHandshakeResult> =
            successes.iter().map(|(_, _, r)| r.clone()).collect();
        let consensus = fold_consensus(&ordered, Timestamp::now()).inspect_err(|e| {
            self.metrics.handshake_rounds_failed.inc();
            tracing::error!(request_id = %request_id, error = %e, "no consensus on latest blockhash");
        })?;

        let connected_peers: Vec<String> = successes.iter().map(|(_, url, _)| url.clone()).collect();
        self.metrics.connected_peers.set(connected_peers.len() as i64);
        tracing::info!(
            request_id = %request_id,
            connected = connected_peers.len(),
            required,
            blockhash = %consensus.latest_blockhash,
            "handshake round completed"
        );

        Ok(HandshakeOutcome {
            request_id,
            connected_peers,
            peer_results: successes
                .into_iter()
                .map(|(_, url, result)| (url, result))
                .collect(),
            consensus,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn handshake_peer(
        &self,
        index: usize,
        url: &str,
        request_id: &RequestId,
        challenge: &Challenge,
        body: &Value,
        attestation_required: bool,
        connected: &AtomicUsize,
    ) -> Result<(usize, String, PeerHandshakeResult), LitError> {
        let outcome = async {
            let endpoint_url = compose_url(url, &Endpoint::HANDSHAKE);
            let json = self.dispatcher.send(&endpoint_url, request_id, body).await?;
            let response: HandshakeResponse = codec::decode(json)?;
            let result = response.into_peer_result()?;

            if result.has_unnegotiated_keys() {
                tracing::error!(
                    url,
                    request_id = %request_id,
                    "peer returned ERR key material; it may not have finished key negotiation"
                );
            }

            if attestation_required {
                let report = result.attestation.as_ref().ok_or_else(|| {
                    LitError::InvalidNodeAttestation {
                        url: url.to_string(),
                        reason: "missing attestation report".into(),
                    }
                })?;
                self.verifier
                    .verify(report, challenge, url)
                    .await
                    .map_err(|e| LitError::InvalidNodeAttestation {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;
            }
            Ok::<_, LitError>(result)
        }
        .await;

        match outcome {
            Ok(result) => {
                connected.fetch_add(1, Ordering::SeqCst);
                Ok((index, url.to_string(), result))
            }
            Err(e) => {
                self.metrics.peer_handshake_failures.inc();
                tracing::warn!(url, request_id = %request_id, error = %e, "peer handshake failed");
                Err(e)
            }
        }
    }
}
