//! Top-level error type shared across crates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Common error type for the Lit network client.
///
/// Errors are `Clone` so a single connect outcome can be handed to every
/// concurrent caller, and `Serialize` so quorum failures can be grouped by
/// their canonical JSON form.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail")]
pub enum LitError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("init error: {0}")]
    InitError(String),

    #[error("invalid node attestation from {url}: {reason}")]
    InvalidNodeAttestation { url: String, reason: String },

    #[error("latest blockhash is not available: {0}")]
    InvalidEthBlockhash(String),

    #[error("not authorized: {0}")]
    NodeNotAuthorized(String),

    #[error("node error: {message}")]
    NodeError {
        error_code: Option<String>,
        error_kind: Option<String>,
        status: Option<u16>,
        message: String,
    },

    #[error("network error talking to {url}: {message}")]
    Network { url: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("unknown error: {0}")]
    UnknownError(String),
}

impl LitError {
    /// Whether retrying the same request could plausibly succeed.
    ///
    /// Transport failures and server-side (5xx) node errors are transient;
    /// configuration, attestation and authorization failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::NodeError { status, .. } => status.map_or(false, |s| s >= 500),
            _ => false,
        }
    }

    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        assert!(LitError::network("http://a", "connection refused").is_transient());
    }

    #[test]
    fn only_server_side_node_errors_are_transient() {
        let server = LitError::NodeError {
            error_code: None,
            error_kind: None,
            status: Some(502),
            message: "bad gateway".into(),
        };
        let client = LitError::NodeError {
            error_code: Some("invalid_param".into()),
            error_kind: Some("Validation".into()),
            status: Some(400),
            message: "bad request".into(),
        };
        assert!(server.is_transient());
        assert!(!client.is_transient());
        assert!(!LitError::NodeNotAuthorized("denied".into()).is_transient());
    }

    #[test]
    fn canonical_json_distinguishes_kinds() {
        let a = serde_json::to_string(&LitError::UnknownError("x".into())).unwrap();
        let b = serde_json::to_string(&LitError::InvalidArgument("x".into())).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, r#"{"kind":"UnknownError","detail":"x"}"#);
    }
}
