//! Fundamental types for the Lit network client.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! the error taxonomy, timestamps, network profiles, epoch state, retry policy,
//! and the consensus config derived from a handshake round.

pub mod consensus;
pub mod contract;
pub mod epoch;
pub mod error;
pub mod network;
pub mod retry;
pub mod time;

pub use consensus::{AttestationReport, ConsensusConfig, PeerHandshakeResult, ERR_SENTINEL};
pub use contract::{ContractContext, StakingState, ValidatorSnapshot};
pub use epoch::{EpochState, EPOCH_PROPAGATION_DELAY_MS, EPOCH_READY_FOR_LOCAL_DEV};
pub use error::LitError;
pub use network::{
    threshold_for, Centralisation, ChainResolvedProfile, LitNetwork, NetworkProfile,
    StaticProfile,
};
pub use retry::RetryPolicy;
pub use time::Timestamp;
