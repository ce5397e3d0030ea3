//! Nullable attestation verifier.

use async_trait::async_trait;
use lit_network::{AttestationError, AttestationVerifier};
use lit_protocol::Challenge;
use lit_types::AttestationReport;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Accepts every report except those from the listed peers.
#[derive(Default)]
pub struct NullAttestationVerifier {
    rejected_peers: HashSet<String>,
    verifications: AtomicUsize,
}

impl NullAttestationVerifier {
    pub fn accept_all() -> Self {
        Self::default()
    }

    pub fn rejecting<I, S>(peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected_peers: peers.into_iter().map(Into::into).collect(),
            verifications: AtomicUsize::new(0),
        }
    }

    pub fn verifications(&self) -> usize {
        self.verifications.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AttestationVerifier for NullAttestationVerifier {
    async fn verify(
        &self,
        _report: &AttestationReport,
        _challenge: &Challenge,
        peer_url: &str,
    ) -> Result<(), AttestationError> {
        self.verifications.fetch_add(1, Ordering::SeqCst);
        if self.rejected_peers.contains(peer_url) {
            return Err(AttestationError::Rejected(format!(
                "{peer_url} is not running verified code"
            )));
        }
        Ok(())
    }
}
