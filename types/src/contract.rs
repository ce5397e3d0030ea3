//! Validator registry vocabulary: contract addresses, staking states, snapshots.

use serde::{Deserialize, Serialize};

use crate::{LitError, Timestamp};

/// Contract addresses for private or custom deployments.
///
/// At least one of the staking contract or the contract resolver must be
/// given; the resolver is used to look the staking contract up.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractContext {
    #[serde(default)]
    pub staking_address: Option<String>,
    #[serde(default)]
    pub resolver_address: Option<String>,
    /// Deployment environment the resolver is asked about.
    #[serde(default)]
    pub environment: u8,
}

impl ContractContext {
    pub fn validate(&self) -> Result<(), LitError> {
        if self.staking_address.is_none() && self.resolver_address.is_none() {
            return Err(LitError::InitError(
                "the provided contract context is missing the staking contract".into(),
            ));
        }
        Ok(())
    }
}

/// State of the staking contract, as announced by its `StateChanged` event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakingState {
    Active,
    NextValidatorSetLocked,
    ReadyForNextEpoch,
    Unlocked,
    Paused,
    Restore,
}

impl TryFrom<u8> for StakingState {
    type Error = LitError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Active),
            1 => Ok(Self::NextValidatorSetLocked),
            2 => Ok(Self::ReadyForNextEpoch),
            3 => Ok(Self::Unlocked),
            4 => Ok(Self::Paused),
            5 => Ok(Self::Restore),
            other => Err(LitError::UnknownError(format!(
                "unknown staking state {other}"
            ))),
        }
    }
}

/// The registry's view of the current validator set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatorSnapshot {
    pub min_node_count: usize,
    pub bootstrap_urls: Vec<String>,
    pub epoch_number: u64,
    pub epoch_start_time: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_needs_staking_or_resolver() {
        assert!(matches!(
            ContractContext::default().validate(),
            Err(LitError::InitError(_))
        ));
        let ctx = ContractContext {
            staking_address: None,
            resolver_address: Some("0x5FbDB2315678afecb367f032d93F642f64180aa3".into()),
            environment: 0,
        };
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn staking_state_codes() {
        assert_eq!(StakingState::try_from(1).unwrap(), StakingState::NextValidatorSetLocked);
        assert!(StakingState::try_from(9).is_err());
    }
}
