//! Attestation report verification.
//!
//! A report is bound to a handshake round by its nonce and to a peer by the
//! `EXTERNAL_ADDR` entry. The report-data field of the hardware report holds
//! a SHA-512 digest over the nonce, the data entries and all signatures but
//! the last; the last signature covers the hardware report itself and is
//! checked by a platform verifier.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use lit_protocol::{socket_address, Challenge};
use lit_types::AttestationReport;
use sha2::{Digest, Sha512};
use thiserror::Error;

/// Offset of the 64-byte report-data field inside a hardware report.
pub const REPORT_DATA_OFFSET: usize = 0x50;
pub const REPORT_DATA_LEN: usize = 64;

const EXTERNAL_ADDR: &str = "EXTERNAL_ADDR";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AttestationError {
    #[error("attestation nonce does not match the handshake challenge")]
    NonceMismatch,

    #[error("attestation is for {found}, expected {expected}")]
    AddressMismatch { expected: String, found: String },

    #[error("attestation is missing {0}")]
    Missing(&'static str),

    #[error("attestation field {field} is not valid base64: {reason}")]
    Decode { field: String, reason: String },

    #[error("attestation report data does not match its signed contents")]
    ReportDataMismatch,

    #[error("attestation rejected: {0}")]
    Rejected(String),
}

/// Verifies a peer's attestation report for one handshake round.
#[async_trait]
pub trait AttestationVerifier: Send + Sync {
    async fn verify(
        &self,
        report: &AttestationReport,
        challenge: &Challenge,
        peer_url: &str,
    ) -> Result<(), AttestationError>;
}

/// Checks that a report belongs to this round and this peer.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChallengeBindingVerifier;

#[async_trait]
impl AttestationVerifier for ChallengeBindingVerifier {
    async fn verify(
        &self,
        report: &AttestationReport,
        challenge: &Challenge,
        peer_url: &str,
    ) -> Result<(), AttestationError> {
        check_binding(report, challenge, peer_url)
    }
}

pub fn check_binding(
    report: &AttestationReport,
    challenge: &Challenge,
    peer_url: &str,
) -> Result<(), AttestationError> {
    let nonce = decode("noonce", &report.noonce)?;
    let expected_nonce = challenge
        .to_bytes()
        .map_err(|e| AttestationError::Rejected(e.to_string()))?;
    if nonce != expected_nonce {
        return Err(AttestationError::NonceMismatch);
    }

    let addr = report
        .data
        .get(EXTERNAL_ADDR)
        .ok_or(AttestationError::Missing(EXTERNAL_ADDR))?;
    let addr = String::from_utf8_lossy(&decode(EXTERNAL_ADDR, addr)?).into_owned();
    let expected = socket_address(peer_url);
    if addr != expected {
        return Err(AttestationError::AddressMismatch {
            expected: expected.to_string(),
            found: addr,
        });
    }

    let raw_report = decode("report", &report.report)?;
    let embedded = raw_report
        .get(REPORT_DATA_OFFSET..REPORT_DATA_OFFSET + REPORT_DATA_LEN)
        .ok_or(AttestationError::Missing("report data"))?;
    if embedded != binding_digest(report)?.as_slice() {
        return Err(AttestationError::ReportDataMismatch);
    }
    Ok(())
}

/// SHA-512 over the nonce, each data entry (key then value, in key order)
/// and every signature except the last.
pub fn binding_digest(report: &AttestationReport) -> Result<[u8; 64], AttestationError> {
    let Some((_, signed)) = report.signatures.split_last() else {
        return Err(AttestationError::Missing("signatures"));
    };

    let mut hasher = Sha512::new();
    hasher.update(b"noonce");
    hasher.update(decode("noonce", &report.noonce)?);
    hasher.update(b"data");
    for (key, value) in &report.data {
        hasher.update(key.as_bytes());
        hasher.update(decode(key, value)?);
    }
    hasher.update(b"signatures");
    for sig in signed {
        hasher.update(decode("signatures", sig)?);
    }
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, AttestationError> {
    BASE64.decode(value).map_err(|e| AttestationError::Decode {
        field: field.to_string(),
        reason: e.to_string(),
    })
}
