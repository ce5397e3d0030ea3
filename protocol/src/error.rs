use lit_types::LitError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}

impl From<ProtocolError> for LitError {
    fn from(e: ProtocolError) -> Self {
        LitError::UnknownError(e.to_string())
    }
}
