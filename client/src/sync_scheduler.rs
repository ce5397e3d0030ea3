//! Periodic blockhash freshness check.
//!
//! Every interval, a blockhash older than the interval triggers a full
//! reconnect, which re-runs the handshake and yields a fresh consensus
//! blockhash. Failures are logged and the loop carries on.

use lit_network::BlockhashCache;
use lit_types::Timestamp;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::{BackgroundTask, Reconnector};

#[derive(Default)]
pub struct NetworkSyncScheduler {
    task: Mutex<Option<BackgroundTask>>,
}

impl NetworkSyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the timer. Returns `false` if it is already running.
    pub fn start(
        &self,
        period: Duration,
        blockhash: Arc<BlockhashCache>,
        reconnector: Arc<dyn Reconnector>,
    ) -> bool {
        let mut task = lock(&self.task);
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return false;
        }

        *task = Some(BackgroundTask::spawn("network-sync", move |mut shutdown| async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let period_ms = period.as_millis() as u64;

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.recv() => break,
                    _ = ticker.tick() => {
                        let now = Timestamp::now();
                        let age_ms = blockhash
                            .current()
                            .map(|sample| sample.retrieved_at.elapsed_since(now));
                        if age_ms.is_some_and(|age| age <= period_ms) {
                            continue;
                        }

                        tracing::debug!(?age_ms, period_ms, "blockhash is stale; syncing network");
                        if let Err(e) = reconnector.reconnect().await {
                            tracing::warn!(error = %e, "network sync failed");
                        }
                    }
                }
            }
        }));
        true
    }

    /// Stop the timer. Returns whether it was running.
    pub fn stop(&self) -> bool {
        lock(&self.task).take().is_some()
    }

    pub fn is_running(&self) -> bool {
        lock(&self.task).as_ref().is_some_and(|t| !t.is_finished())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
