//! Mapping of failed quorum requests to the error returned to callers.

use lit_network::QuorumFailure;
use lit_protocol::RequestId;
use lit_types::LitError;

const NOT_AUTHORIZED_CODES: [&str; 2] = ["NodeNotAuthorized", "not_authorized"];

/// Turn a quorum failure into a single caller-facing error.
///
/// Authorization refusals become [`LitError::NodeNotAuthorized`], optionally
/// raising an alert in the logs. Other node errors pass through unchanged.
pub fn throw_node_error(
    failure: QuorumFailure,
    alert_when_unauthorized: bool,
    request_id: &RequestId,
) -> LitError {
    tracing::error!(
        request_id = %request_id,
        successes = failure.successes,
        required = failure.required,
        failures = failure.errors.len(),
        error = %failure.error,
        "quorum request failed"
    );

    let unauthorized = match &failure.error {
        LitError::NodeNotAuthorized(message) => Some(message.clone()),
        LitError::NodeError {
            error_code: Some(code),
            message,
            ..
        } if NOT_AUTHORIZED_CODES.contains(&code.as_str()) => Some(message.clone()),
        _ => None,
    };

    match unauthorized {
        Some(message) => {
            if alert_when_unauthorized {
                tracing::warn!(request_id = %request_id, "you are not authorized to access this content");
            }
            LitError::NodeNotAuthorized(message)
        }
        None => failure.error,
    }
}
