//! Networking layer of the Lit client.
//!
//! Talks to individual peers over HTTP, retries transient failures,
//! aggregates N-of-M results, runs handshake rounds and resolves the
//! bootstrap peer set (from config or the on-chain validator registry)
//! and the latest blockhash.

pub mod attestation;
pub mod blockhash;
pub mod consensus;
pub mod dispatcher;
pub mod handshake;
pub mod metrics;
pub mod quorum;
pub mod registry;
pub mod resolver;
pub mod retry;
mod rpc;
pub mod transport;

pub use attestation::{AttestationError, AttestationVerifier, ChallengeBindingVerifier};
pub use blockhash::{
    BlockhashCache, BlockhashProvider, BlockhashSample, IndexerBlockhashProvider,
    DEFAULT_BLOCKHASH_INDEXER_URL, FALLBACK_RPC_URLS,
};
pub use consensus::{fold_consensus, most_common};
pub use dispatcher::{RequestDispatcher, SharedEpochState};
pub use handshake::{HandshakeCoordinator, HandshakeOutcome, HandshakeRound};
pub use metrics::NetworkMetrics;
pub use quorum::{most_common_error, race, QuorumFailure};
pub use registry::{RpcValidatorRegistry, DATIL_STAKING_ADDRESS, STATE_CHANGED_TOPIC};
pub use resolver::{ConfigResolver, ResolvedPeers, ValidatorRegistry};
pub use retry::{execute_with_retry, RetryAttempt, RetryHook, TracingRetryHook};
pub use transport::{HttpTransport, NodeTransport};
