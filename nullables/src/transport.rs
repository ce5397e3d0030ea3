//! Nullable transport: scripted per-URL responses, recorded requests.

use async_trait::async_trait;
use lit_network::NodeTransport;
use lit_types::LitError;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// What a scripted URL answers with.
#[derive(Clone, Debug)]
pub enum ScriptedResponse {
    Json(Value),
    Error(LitError),
    /// Never answers.
    Hang,
}

#[derive(Clone, Debug)]
struct Step {
    delay: Duration,
    response: ScriptedResponse,
}

/// A request the transport received.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl RecordedCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A transport that answers from a script instead of the network.
///
/// Each URL holds a queue of steps; the last step repeats forever.
/// Unscripted URLs fail with a transport error.
#[derive(Default)]
pub struct NullTransport {
    script: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for `url`, delivered after `delay`.
    pub fn push(&self, url: impl Into<String>, delay: Duration, response: ScriptedResponse) -> &Self {
        self.lock_script()
            .entry(url.into())
            .or_default()
            .push_back(Step { delay, response });
        self
    }

    pub fn respond(&self, url: impl Into<String>, body: Value) -> &Self {
        self.push(url, Duration::ZERO, ScriptedResponse::Json(body))
    }

    pub fn respond_after(&self, url: impl Into<String>, delay: Duration, body: Value) -> &Self {
        self.push(url, delay, ScriptedResponse::Json(body))
    }

    pub fn fail(&self, url: impl Into<String>, error: LitError) -> &Self {
        self.push(url, Duration::ZERO, ScriptedResponse::Error(error))
    }

    pub fn hang(&self, url: impl Into<String>) -> &Self {
        self.push(url, Duration::ZERO, ScriptedResponse::Hang)
    }

    /// All requests received so far (for assertions).
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock_calls().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock_calls().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.lock_calls().iter().filter(|c| c.url == url).count()
    }

    /// Forget recorded calls, keeping the script.
    pub fn reset_calls(&self) {
        self.lock_calls().clear();
    }

    fn next_step(&self, url: &str) -> Option<Step> {
        let mut script = self.lock_script();
        let queue = script.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, HashMap<String, VecDeque<Step>>> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_calls(&self) -> std::sync::MutexGuard<'_, Vec<RecordedCall>> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl NodeTransport for NullTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<Value, LitError> {
        self.lock_calls().push(RecordedCall {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.clone(),
        });

        let Some(step) = self.next_step(url) else {
            return Err(LitError::network(url, "no scripted response"));
        };
        if !step.delay.is_zero() {
            tokio::time::sleep(step.delay).await;
        }
        match step.response {
            ScriptedResponse::Json(value) => Ok(value),
            ScriptedResponse::Error(e) => Err(e),
            ScriptedResponse::Hang => std::future::pending().await,
        }
    }
}

/// A handshake response body with the given network key and blockhash.
pub fn handshake_json(network_pub_key: &str, blockhash: &str) -> Value {
    json!({
        "serverPublicKey": format!("server-{network_pub_key}"),
        "subnetPublicKey": "subnet-key",
        "networkPublicKey": network_pub_key,
        "networkPublicKeySet": "network-key-set",
        "hdRootPubkeys": ["hd-root-1", "hd-root-2"],
        "latestBlockhash": blockhash,
    })
}
