//! N-of-M aggregation over concurrent peer operations.

use futures_util::stream::{FuturesUnordered, StreamExt};
use lit_types::LitError;
use std::future::Future;

/// The pool settled without reaching the required number of successes.
#[derive(Clone, Debug, PartialEq)]
pub struct QuorumFailure {
    /// The most frequent error, used as the representative failure.
    pub error: LitError,
    /// Every error in arrival order, for diagnostics.
    pub errors: Vec<LitError>,
    pub successes: usize,
    pub required: usize,
}

/// Resolve once `required` operations have succeeded.
///
/// All operations run concurrently. The returned values are the first
/// `required` successes in completion order; operations still pending at
/// that point are dropped. If every operation settles first, the most
/// common error is reported.
pub async fn race<T, I, F>(operations: I, required: usize) -> Result<Vec<T>, QuorumFailure>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<T, LitError>>,
{
    let mut pending: FuturesUnordered<F> = operations.into_iter().collect();
    let mut values = Vec::with_capacity(required);
    let mut errors = Vec::new();

    if required == 0 {
        return Ok(values);
    }

    while let Some(result) = pending.next().await {
        match result {
            Ok(value) => {
                values.push(value);
                if values.len() >= required {
                    return Ok(values);
                }
            }
            Err(e) => errors.push(e),
        }
    }

    let error = most_common_error(&errors).unwrap_or_else(|| {
        LitError::UnknownError(format!(
            "quorum of {required} not reached with {} operations",
            values.len()
        ))
    });
    Err(QuorumFailure {
        error,
        errors,
        successes: values.len(),
        required,
    })
}

/// The error occurring most often, compared by canonical JSON form.
/// Network errors are compared without their peer URL. Ties go to the
/// error seen first.
pub fn most_common_error(errors: &[LitError]) -> Option<LitError> {
    let mut counts: Vec<(String, usize, &LitError)> = Vec::new();
    for error in errors {
        let key = grouping_key(error);
        match counts.iter_mut().find(|(k, _, _)| *k == key) {
            Some(entry) => entry.1 += 1,
            None => counts.push((key, 1, error)),
        }
    }

    let mut best: Option<&(String, usize, &LitError)> = None;
    for entry in &counts {
        if best.map_or(true, |b| entry.1 > b.1) {
            best = Some(entry);
        }
    }
    best.map(|(_, _, e)| (*e).clone())
}

fn grouping_key(error: &LitError) -> String {
    let peerless;
    let keyed = match error {
        LitError::Network { message, .. } => {
            peerless = LitError::network("", message.clone());
            &peerless
        }
        other => other,
    };
    serde_json::to_string(keyed).unwrap_or_else(|_| keyed.to_string())
}
