//! Request correlation ids and attestation challenges.

use std::fmt;

use crate::ProtocolError;

fn random_hex(len_bytes: usize) -> Result<String, ProtocolError> {
    let mut buf = vec![0u8; len_bytes];
    getrandom::getrandom(&mut buf).map_err(|e| ProtocolError::Entropy(e.to_string()))?;
    Ok(hex::encode(buf))
}

/// Correlation id shared by every peer request of one logical operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Result<Self, ProtocolError> {
        random_hex(8).map(Self)
    }

    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `X-Request-Id` header.
    pub fn header_value(&self) -> String {
        format!("lit_{}", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random value a handshake round binds attestation reports to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Challenge(String);

impl Challenge {
    /// 32 random bytes, hex encoded (64 characters).
    pub fn generate() -> Result<Self, ProtocolError> {
        random_hex(32).map(Self)
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        hex::decode(&self.0).map_err(|e| ProtocolError::Malformed(format!("challenge: {e}")))
    }
}
