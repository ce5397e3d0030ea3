//! Epoch tracking state.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// For this long after an epoch starts, peers may still be on the previous one.
pub const EPOCH_PROPAGATION_DELAY_MS: u64 = 45_000;

/// Epochs below this number are never rolled back (fresh local networks start at 1).
pub const EPOCH_READY_FOR_LOCAL_DEV: u64 = 3;

/// Last known epoch of the validator set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochState {
    /// Epoch number, `None` until first resolved.
    pub number: Option<u64>,
    /// When the epoch began, if the registry reported it.
    pub start_time: Option<Timestamp>,
    /// When this state was last written.
    pub last_update_time: Option<Timestamp>,
}

impl EpochState {
    pub fn new(number: u64, start_time: Option<Timestamp>, now: Timestamp) -> Self {
        Self {
            number: Some(number),
            start_time,
            last_update_time: Some(now),
        }
    }

    /// The epoch number peers are expected to accept at `now`.
    ///
    /// Inside the propagation window of a new epoch the previous number is
    /// used, unless the network is still in its first epochs.
    pub fn effective_number(&self, now: Timestamp) -> Option<u64> {
        let number = self.number?;
        let Some(start) = self.start_time else {
            return Some(number);
        };
        let within_delay = !start.has_expired(EPOCH_PROPAGATION_DELAY_MS, now);
        if within_delay && number >= EPOCH_READY_FOR_LOCAL_DEV {
            Some(number - 1)
        } else {
            Some(number)
        }
    }
}
