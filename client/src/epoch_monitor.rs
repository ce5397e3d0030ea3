//! Validator-set change monitoring.
//!
//! Listens to the registry's `StateChanged` stream. When the next validator
//! set is locked, waits for the change to propagate to the peers, re-reads
//! the epoch and, if the validator URLs moved, reconnects.

use lit_network::{SharedEpochState, ValidatorRegistry};
use lit_types::{ChainResolvedProfile, ContractContext, EpochState, LitError, StakingState, Timestamp};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::{BackgroundTask, Reconnector};

/// Identifies one active subscription to the state-change stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct EpochMonitor {
    refresher: EpochRefresher,
    next_id: AtomicU64,
    active: Mutex<Option<(SubscriptionId, BackgroundTask)>>,
}

#[derive(Clone)]
struct EpochRefresher {
    registry: Arc<dyn ValidatorRegistry>,
    profile: ChainResolvedProfile,
    context: Option<ContractContext>,
    epoch: SharedEpochState,
    propagation_delay: Duration,
}

impl EpochMonitor {
    pub fn new(
        registry: Arc<dyn ValidatorRegistry>,
        profile: ChainResolvedProfile,
        context: Option<ContractContext>,
        epoch: SharedEpochState,
        propagation_delay: Duration,
    ) -> Self {
        Self {
            refresher: EpochRefresher {
                registry,
                profile,
                context,
                epoch,
                propagation_delay,
            },
            next_id: AtomicU64::new(0),
            active: Mutex::new(None),
        }
    }

    /// Subscribe to state changes. A no-op returning the existing id when
    /// already subscribed.
    pub fn start(&self, reconnector: Arc<dyn Reconnector>) -> Result<SubscriptionId, LitError> {
        let mut active = lock(&self.active);
        if let Some((id, task)) = active.as_ref() {
            if !task.is_finished() {
                return Ok(*id);
            }
        }

        let events = self.refresher.registry.state_changes().ok_or_else(|| {
            LitError::UnknownError("validator registry does not publish state changes".into())
        })?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let refresher = self.refresher.clone();
        let task = BackgroundTask::spawn("epoch-monitor", move |shutdown| {
            refresher.run(events, shutdown, reconnector)
        });
        *active = Some((id, task));

        tracing::debug!(network = %self.refresher.profile.network, subscription = id.0, "listening for staking state changes");
        Ok(id)
    }

    /// Unsubscribe. Returns whether a subscription was active.
    pub fn stop(&self) -> bool {
        lock(&self.active).take().is_some()
    }

    pub fn active_subscription(&self) -> Option<SubscriptionId> {
        lock(&self.active).as_ref().map(|(id, _)| *id)
    }

    /// Live read of the registry's current epoch.
    pub async fn current_epoch_number(&self) -> Result<u64, LitError> {
        self.refresher
            .registry
            .current_epoch(&self.refresher.profile, self.refresher.context.as_ref())
            .await
            .map_err(|e| LitError::UnknownError(format!("error getting current epoch number: {e}")))
    }
}

impl EpochRefresher {
    async fn run(
        self,
        mut events: broadcast::Receiver<StakingState>,
        mut shutdown: broadcast::Receiver<()>,
        reconnector: Arc<dyn Reconnector>,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(StakingState::NextValidatorSetLocked) => {
                    tracing::info!(
                        delay_ms = self.propagation_delay.as_millis() as u64,
                        "next validator set locked; refreshing epoch after propagation delay"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(self.propagation_delay) => {}
                    }
                    self.on_validator_set_locked(reconnector.as_ref()).await;
                }
                Ok(state) => tracing::trace!(?state, "ignoring staking state change"),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "missed staking state changes");
                }
                Err(RecvError::Closed) => {
                    tracing::warn!("staking state change stream closed");
                    break;
                }
            }
        }
    }

    async fn on_validator_set_locked(&self, reconnector: &dyn Reconnector) {
        let snapshot = match self
            .registry
            .connection_info(&self.profile, self.context.as_ref())
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "failed to refresh epoch after validator set change");
                return;
            }
        };

        *self.epoch.write().await = EpochState::new(
            snapshot.epoch_number,
            snapshot.epoch_start_time,
            Timestamp::now(),
        );
        tracing::info!(epoch = snapshot.epoch_number, "epoch updated");

        let current = reconnector.current_bootstrap_urls();
        if urls_differ(&current, &snapshot.bootstrap_urls) {
            tracing::warn!(
                old = ?current,
                new = ?snapshot.bootstrap_urls,
                "validator urls changed; reconnecting"
            );
            if let Err(e) = reconnector.reconnect().await {
                tracing::error!(error = %e, "reconnect after validator set change failed");
            }
        }
    }
}

fn urls_differ(a: &[String], b: &[String]) -> bool {
    a.iter().collect::<BTreeSet<_>>() != b.iter().collect::<BTreeSet<_>>()
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
