//! Lit network client.
//!
//! [`LitClient`] discovers the active peer set, handshakes with it, keeps
//! the consensus config, epoch and blockhash current in the background and
//! sends quorum requests to the connected peers.

pub mod background;
pub mod client;
pub mod config;
pub mod epoch_monitor;
pub mod node_error;
pub mod state;
pub mod sync_scheduler;

pub use background::BackgroundTask;
pub use client::{LitClient, LitClientBuilder, Reconnector};
pub use config::ClientConfig;
pub use epoch_monitor::{EpochMonitor, SubscriptionId};
pub use node_error::throw_node_error;
pub use state::NetworkSnapshot;
pub use sync_scheduler::NetworkSyncScheduler;
