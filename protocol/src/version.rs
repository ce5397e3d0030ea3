//! SDK identification sent with every request.

/// Version reported to nodes in [`HEADER_SDK_VERSION`].
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Implementation reported to nodes in [`HEADER_SDK_TYPE`].
pub const SDK_TYPE: &str = "Rust";

pub const HEADER_SDK_VERSION: &str = "X-Lit-SDK-Version";
pub const HEADER_SDK_TYPE: &str = "X-Lit-SDK-Type";
pub const HEADER_REQUEST_ID: &str = "X-Request-Id";
