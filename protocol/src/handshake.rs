//! Handshake messages exchanged with `POST {peer}/web/handshake`.

use lit_types::{AttestationReport, PeerHandshakeResult};
use serde::{Deserialize, Serialize};

use crate::{Challenge, ProtocolError};

/// Placeholder key the nodes expect from clients without a session key.
pub const CLIENT_PUBLIC_KEY: &str = "test";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeRequest {
    pub client_public_key: String,
    pub challenge: String,
}

impl HandshakeRequest {
    pub fn new(challenge: &Challenge) -> Self {
        Self {
            client_public_key: CLIENT_PUBLIC_KEY.to_string(),
            challenge: challenge.as_hex().to_string(),
        }
    }
}

/// Handshake response as sent by a node.
///
/// Key fields are optional on the wire so a missing one is reported by
/// name instead of as a generic parse failure.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeResponse {
    pub server_public_key: Option<String>,
    pub subnet_public_key: Option<String>,
    pub network_public_key: Option<String>,
    pub network_public_key_set: Option<String>,
    #[serde(default)]
    pub hd_root_pubkeys: Option<Vec<String>>,
    #[serde(default)]
    pub latest_blockhash: Option<String>,
    #[serde(default)]
    pub attestation: Option<AttestationReport>,
}

impl HandshakeResponse {
    pub fn into_peer_result(self) -> Result<PeerHandshakeResult, ProtocolError> {
        Ok(PeerHandshakeResult {
            server_pub_key: self
                .server_public_key
                .ok_or(ProtocolError::MissingField("serverPublicKey"))?,
            subnet_pub_key: self
                .subnet_public_key
                .ok_or(ProtocolError::MissingField("subnetPublicKey"))?,
            network_pub_key: self
                .network_public_key
                .ok_or(ProtocolError::MissingField("networkPublicKey"))?,
            network_pub_key_set: self
                .network_public_key_set
                .ok_or(ProtocolError::MissingField("networkPublicKeySet"))?,
            hd_root_pubkeys: self.hd_root_pubkeys,
            latest_blockhash: self.latest_blockhash,
            attestation: self.attestation,
        })
    }
}
