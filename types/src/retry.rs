//! Retry policy shared by every outbound request class.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded-retry settings for one class of request.
///
/// `max_retry_count` counts retries, so a request is attempted at most
/// `max_retry_count + 1` times. Each attempt is bounded by `timeout_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retry_count")]
    pub max_retry_count: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_timeout_ms() -> u64 {
    31_000
}

fn default_max_retry_count() -> u32 {
    3
}

fn default_interval_ms() -> u64 {
    100
}

impl RetryPolicy {
    pub fn new(timeout_ms: u64, max_retry_count: u32, interval_ms: u64) -> Self {
        Self {
            timeout_ms,
            max_retry_count,
            interval_ms,
        }
    }

    /// A policy that attempts once and never retries.
    pub fn no_retry(timeout_ms: u64) -> Self {
        Self::new(timeout_ms, 0, 0)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retry_count: default_max_retry_count(),
            interval_ms: default_interval_ms(),
        }
    }
}
