//! Timestamp type used throughout the client.
//!
//! Timestamps are Unix epoch milliseconds (UTC). Freshness checks on the
//! cached blockhash and the epoch propagation window both work at
//! millisecond resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A Unix timestamp in milliseconds since epoch (UTC).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch (time zero).
    pub const EPOCH: Self = Self(0);

    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Get the current system time as a `Timestamp`.
    ///
    /// A clock set before the Unix epoch reads as [`Timestamp::EPOCH`].
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        Self(millis as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn as_secs(&self) -> u64 {
        self.0 / 1000
    }

    /// Milliseconds elapsed since this timestamp (relative to `now`).
    pub fn elapsed_since(&self, now: Timestamp) -> u64 {
        now.0.saturating_sub(self.0)
    }

    /// Whether this timestamp + duration has passed relative to `now`.
    pub fn has_expired(&self, duration_ms: u64, now: Timestamp) -> bool {
        now.0 >= self.0.saturating_add(duration_ms)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_for_future_timestamps() {
        let later = Timestamp::from_millis(5_000);
        assert_eq!(later.elapsed_since(Timestamp::from_millis(1_000)), 0);
        assert_eq!(
            Timestamp::from_millis(1_000).elapsed_since(later),
            4_000
        );
    }

    #[test]
    fn expiry_is_inclusive_at_the_boundary() {
        let start = Timestamp::from_millis(10_000);
        assert!(!start.has_expired(30_000, Timestamp::from_millis(39_999)));
        assert!(start.has_expired(30_000, Timestamp::from_millis(40_000)));
    }

    #[test]
    fn seconds_convert_to_millis() {
        assert_eq!(Timestamp::from_secs(3).as_millis(), 3_000);
        assert_eq!(Timestamp::from_millis(3_999).as_secs(), 3);
    }
}
