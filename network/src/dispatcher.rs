//! Outbound request dispatch.
//!
//! Every request body is stamped with the effective epoch number read at
//! send time, stripped of session signatures, sent with the SDK headers
//! and the shared request id, and retried under the retry policy.

use lit_protocol::{RequestId, HEADER_REQUEST_ID, HEADER_SDK_TYPE, HEADER_SDK_VERSION, SDK_TYPE, SDK_VERSION};
use lit_types::{EpochState, LitError, RetryPolicy, Timestamp};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::retry::{execute_with_retry, RetryAttempt, RetryHook, TracingRetryHook};
use crate::{NetworkMetrics, NodeTransport};

/// Epoch state shared between the dispatcher and the epoch monitor.
pub type SharedEpochState = Arc<RwLock<EpochState>>;

const EPOCH_FIELD: &str = "epochNumber";
const SESSION_SIGS_FIELD: &str = "sessionSigs";

pub struct RequestDispatcher {
    transport: Arc<dyn NodeTransport>,
    epoch: SharedEpochState,
    retry_policy: RetryPolicy,
    metrics: Arc<NetworkMetrics>,
}

struct DispatchRetryHook<'a> {
    metrics: &'a NetworkMetrics,
    request_id: &'a RequestId,
}

impl RetryHook for DispatchRetryHook<'_> {
    fn on_retry(&self, attempt: &RetryAttempt<'_>) {
        self.metrics.request_retries.inc();
        tracing::debug!(request_id = %self.request_id, "retrying request");
        TracingRetryHook.on_retry(attempt);
    }
}

impl RequestDispatcher {
    pub fn new(
        transport: Arc<dyn NodeTransport>,
        epoch: SharedEpochState,
        retry_policy: RetryPolicy,
        metrics: Arc<NetworkMetrics>,
    ) -> Self {
        Self {
            transport,
            epoch,
            retry_policy,
            metrics,
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn epoch_state(&self) -> &SharedEpochState {
        &self.epoch
    }

    /// POST `body` to `url` and return the decoded response.
    ///
    /// `body` must be a JSON object.
    pub async fn send(
        &self,
        url: &str,
        request_id: &RequestId,
        body: &Value,
    ) -> Result<Value, LitError> {
        let Value::Object(base) = body else {
            return Err(LitError::InvalidArgument(
                "request body must be a JSON object".into(),
            ));
        };
        let headers = request_headers(request_id);
        let hook = DispatchRetryHook {
            metrics: &self.metrics,
            request_id,
        };

        execute_with_retry(&self.retry_policy, url, &hook, |attempt| {
            let headers = &headers;
            let mut payload = base.clone();
            async move {
                let epoch = self.epoch.read().await.effective_number(Timestamp::now());
                payload.remove(SESSION_SIGS_FIELD);
                payload.insert(
                    EPOCH_FIELD.to_string(),
                    epoch.map_or(Value::Null, Value::from),
                );

                self.metrics.requests_dispatched.inc();
                tracing::trace!(url, request_id = %request_id, attempt, ?epoch, "sending request");
                self.transport
                    .post_json(url, headers, &Value::Object(payload))
                    .await
            }
        })
        .await
    }
}

fn request_headers(request_id: &RequestId) -> Vec<(String, String)> {
    vec![
        (HEADER_SDK_VERSION.to_string(), SDK_VERSION.to_string()),
        (HEADER_SDK_TYPE.to_string(), SDK_TYPE.to_string()),
        (HEADER_REQUEST_ID.to_string(), request_id.header_value()),
    ]
}
