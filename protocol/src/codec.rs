//! JSON codec for node responses, including node-reported errors.

use lit_types::LitError;
use serde::Deserialize;

use crate::ProtocolError;

/// Decode a typed value from a JSON response body.
pub fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// Error body returned by nodes on non-2xx responses.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeErrorBody {
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Build the error for a non-2xx node response.
///
/// A JSON body in the node error format is preserved field by field; any
/// other body falls back to the HTTP status.
pub fn node_error(status: u16, body: Option<serde_json::Value>) -> LitError {
    let parsed = body
        .clone()
        .and_then(|b| serde_json::from_value::<NodeErrorBody>(b).ok())
        .unwrap_or_default();

    let message = parsed
        .message
        .or_else(|| match body {
            Some(serde_json::Value::String(text)) => Some(text),
            Some(serde_json::Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .unwrap_or_else(|| format!("HTTP status {status}"));

    LitError::NodeError {
        error_code: parsed.error_code,
        error_kind: parsed.error_kind,
        status: Some(parsed.status.unwrap_or(status)),
        message,
    }
}
