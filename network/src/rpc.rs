//! Ethereum JSON-RPC calls shared by the blockhash providers and the
//! validator registry.

use lit_types::LitError;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// One JSON-RPC request. A missing or null result is an error.
pub(crate) async fn call(
    http: &reqwest::Client,
    url: &str,
    method: &str,
    params: Value,
) -> Result<Value, LitError> {
    let request = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
    let response = http
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|e| LitError::network(url, format!("{method}: {}", e.without_url())))?;
    if !response.status().is_success() {
        return Err(LitError::network(
            url,
            format!("{method}: HTTP status {}", response.status()),
        ));
    }
    let body: RpcResponse = response
        .json()
        .await
        .map_err(|e| LitError::network(url, format!("{method}: {}", e.without_url())))?;
    if let Some(error) = body.error {
        return Err(LitError::network(url, format!("{method}: {error}")));
    }
    body.result
        .filter(|r| !r.is_null())
        .ok_or_else(|| LitError::network(url, format!("{method}: empty result")))
}

pub(crate) async fn block_number(http: &reqwest::Client, url: &str) -> Result<u64, LitError> {
    let head = call(http, url, "eth_blockNumber", json!([])).await?;
    head.as_str()
        .and_then(parse_quantity)
        .ok_or_else(|| LitError::network(url, format!("invalid block number {head}")))
}

pub(crate) fn parse_quantity(hex: &str) -> Option<u64> {
    u64::from_str_radix(hex.strip_prefix("0x")?, 16).ok()
}
