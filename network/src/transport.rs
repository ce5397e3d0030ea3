//! HTTP transport to individual peers.

use async_trait::async_trait;
use lit_types::LitError;
use serde_json::Value;
use std::time::Duration;

/// Connection timeout for new peer connections.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Sends one JSON request to one peer.
///
/// Implementations return the decoded JSON body for 2xx responses and a
/// [`LitError::NodeError`] carrying the node's error body otherwise.
/// Transport-level failures are [`LitError::Network`].
#[async_trait]
pub trait NodeTransport: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<Value, LitError>;
}

/// `reqwest`-backed transport with a shared connection pool.
#[derive(Clone)]
pub struct HttpTransport {
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { http_client }
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<Value, LitError> {
        let mut request = self.http_client.post(url).json(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        // Peer URLs stay out of messages so equal failures compare equal.
        let response = request.send().await.map_err(|e| {
            let e = e.without_url();
            if e.is_timeout() {
                LitError::network(url, format!("request timed out: {e}"))
            } else if e.is_connect() {
                LitError::network(url, format!("connection failed: {e}"))
            } else {
                LitError::network(url, e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| {
                LitError::network(url, format!("failed to read response: {}", e.without_url()))
            })?;
        let json = serde_json::from_str::<Value>(&text).ok();

        if !status.is_success() {
            return Err(lit_protocol::codec::node_error(
                status.as_u16(),
                json.or_else(|| (!text.is_empty()).then(|| Value::String(text))),
            ));
        }

        json.ok_or_else(|| {
            LitError::NodeError {
                error_code: None,
                error_kind: Some("Parser".into()),
                status: Some(status.as_u16()),
                message: "response is not valid JSON".into(),
            }
        })
    }
}
