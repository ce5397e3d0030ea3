//! Nullable blockhash source.

use async_trait::async_trait;
use lit_network::{BlockhashProvider, BlockhashSample};
use lit_types::{LitError, Timestamp};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Returns a configured blockhash (or error) and counts fetches.
pub struct NullBlockhashProvider {
    next: Mutex<Result<String, LitError>>,
    fetches: AtomicUsize,
    delay: Duration,
}

impl NullBlockhashProvider {
    pub fn succeeding(blockhash: impl Into<String>) -> Self {
        Self {
            next: Mutex::new(Ok(blockhash.into())),
            fetches: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            next: Mutex::new(Err(LitError::InvalidEthBlockhash(
                "no blockhash source available".into(),
            ))),
            fetches: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Every fetch takes `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set(&self, next: Result<String, LitError>) {
        *self.next.lock().unwrap_or_else(|e| e.into_inner()) = next;
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlockhashProvider for NullBlockhashProvider {
    async fn fetch_latest(&self) -> Result<BlockhashSample, LitError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let next = self.next.lock().unwrap_or_else(|e| e.into_inner()).clone();
        next.map(|blockhash| BlockhashSample {
            blockhash,
            block_number: None,
            retrieved_at: Timestamp::now(),
        })
    }
}
