//! Nullable validator registry.

use async_trait::async_trait;
use lit_network::ValidatorRegistry;
use lit_types::{ChainResolvedProfile, ContractContext, LitError, StakingState, ValidatorSnapshot};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// A registry whose validator set and epoch are set by the test.
///
/// `emit` plays the role of the staking contract's `StateChanged` event.
pub struct NullRegistry {
    snapshot: Mutex<Result<ValidatorSnapshot, LitError>>,
    epoch: Mutex<Result<u64, LitError>>,
    events: broadcast::Sender<StakingState>,
    connection_info_calls: AtomicUsize,
    current_epoch_calls: AtomicUsize,
}

impl NullRegistry {
    pub fn new(snapshot: ValidatorSnapshot) -> Self {
        let (events, _) = broadcast::channel(16);
        let epoch = snapshot.epoch_number;
        Self {
            snapshot: Mutex::new(Ok(snapshot)),
            epoch: Mutex::new(Ok(epoch)),
            events,
            connection_info_calls: AtomicUsize::new(0),
            current_epoch_calls: AtomicUsize::new(0),
        }
    }

    /// Replace the validator set; the epoch read follows it.
    pub fn set_snapshot(&self, snapshot: ValidatorSnapshot) {
        *lock(&self.epoch) = Ok(snapshot.epoch_number);
        *lock(&self.snapshot) = Ok(snapshot);
    }

    pub fn fail_connection_info(&self, error: LitError) {
        *lock(&self.snapshot) = Err(error);
    }

    pub fn set_epoch(&self, epoch: u64) {
        *lock(&self.epoch) = Ok(epoch);
    }

    pub fn fail_epoch(&self, error: LitError) {
        *lock(&self.epoch) = Err(error);
    }

    /// Announce a staking state change. Returns the number of listeners.
    pub fn emit(&self, state: StakingState) -> usize {
        self.events.send(state).unwrap_or(0)
    }

    pub fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    pub fn connection_info_calls(&self) -> usize {
        self.connection_info_calls.load(Ordering::SeqCst)
    }

    pub fn current_epoch_calls(&self) -> usize {
        self.current_epoch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ValidatorRegistry for NullRegistry {
    async fn connection_info(
        &self,
        _profile: &ChainResolvedProfile,
        _context: Option<&ContractContext>,
    ) -> Result<ValidatorSnapshot, LitError> {
        self.connection_info_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.snapshot).clone()
    }

    async fn current_epoch(
        &self,
        _profile: &ChainResolvedProfile,
        _context: Option<&ContractContext>,
    ) -> Result<u64, LitError> {
        self.current_epoch_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.epoch).clone()
    }

    fn state_changes(&self) -> Option<broadcast::Receiver<StakingState>> {
        Some(self.events.subscribe())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}
