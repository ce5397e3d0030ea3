//! Prometheus metrics for the network layer.
//!
//! [`NetworkMetrics`] owns a dedicated [`Registry`] so an embedding
//! application can encode it next to its own metrics.

use prometheus::{Encoder, IntCounter, IntGauge, Opts, Registry, TextEncoder};

pub struct NetworkMetrics {
    pub registry: Registry,

    /// Handshake rounds started.
    pub handshake_rounds: IntCounter,
    /// Handshake rounds that failed (timeout, quorum, blockhash).
    pub handshake_rounds_failed: IntCounter,
    /// Individual peers that failed their handshake.
    pub peer_handshake_failures: IntCounter,
    /// Requests handed to the transport, counting each attempt.
    pub requests_dispatched: IntCounter,
    /// Attempts that were retried after a transient failure.
    pub request_retries: IntCounter,
    /// Peers in the most recently published connected set.
    pub connected_peers: IntGauge,
}

impl NetworkMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let handshake_rounds = counter(
            &registry,
            "lit_handshake_rounds_total",
            "Handshake rounds started",
        )?;
        let handshake_rounds_failed = counter(
            &registry,
            "lit_handshake_rounds_failed_total",
            "Handshake rounds that did not reach quorum or consensus",
        )?;
        let peer_handshake_failures = counter(
            &registry,
            "lit_peer_handshake_failures_total",
            "Per-peer handshake failures",
        )?;
        let requests_dispatched = counter(
            &registry,
            "lit_requests_dispatched_total",
            "Request attempts sent to peers",
        )?;
        let request_retries = counter(
            &registry,
            "lit_request_retries_total",
            "Request attempts retried after a transient failure",
        )?;

        let connected_peers = IntGauge::with_opts(Opts::new(
            "lit_connected_peers",
            "Peers in the current connected set",
        ))?;
        registry.register(Box::new(connected_peers.clone()))?;

        Ok(Self {
            registry,
            handshake_rounds,
            handshake_rounds_failed,
            peer_handshake_failures,
            requests_dispatched,
            request_retries,
            connected_peers,
        })
    }

    /// Prometheus text exposition of every metric in [`Self::registry`].
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
    let c = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}
