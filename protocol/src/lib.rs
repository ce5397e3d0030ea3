//! Wire protocol: handshake messages, endpoint composition, SDK headers,
//! request ids and challenges, and the JSON codec for node responses.

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod handshake;
pub mod request;
pub mod version;

pub use endpoint::{compose_url, socket_address, Endpoint};
pub use error::ProtocolError;
pub use handshake::{HandshakeRequest, HandshakeResponse, CLIENT_PUBLIC_KEY};
pub use request::{Challenge, RequestId};
pub use version::{HEADER_REQUEST_ID, HEADER_SDK_TYPE, HEADER_SDK_VERSION, SDK_TYPE, SDK_VERSION};
