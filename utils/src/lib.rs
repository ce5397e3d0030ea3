//! Shared utilities for the Lit network client.

pub mod logging;
pub mod time;

pub use logging::{init_logging, LogFormat};
pub use time::format_duration_ms;
