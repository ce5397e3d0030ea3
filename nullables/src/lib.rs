//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the client (peer transport, validator
//! registry, blockhash sources, attestation verification) sits behind a
//! trait. The implementations here:
//! - Return scripted values
//! - Can be controlled programmatically
//! - Count their calls so tests can assert on network traffic
//! - Never touch the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod attestation;
pub mod blockhash;
pub mod registry;
pub mod transport;

pub use attestation::NullAttestationVerifier;
pub use blockhash::NullBlockhashProvider;
pub use registry::NullRegistry;
pub use transport::{handshake_json, NullTransport, RecordedCall, ScriptedResponse};
