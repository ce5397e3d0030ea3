//! Bounded-retry executor.
//!
//! Each attempt is limited by the policy timeout. Transient failures are
//! retried up to `max_retry_count` times, `interval` apart; the hook sees
//! every non-final failure. Non-transient errors and the last transient
//! error are returned unchanged.

use lit_types::{LitError, RetryPolicy};
use std::future::Future;
use std::time::Duration;

/// A failed attempt that is about to be retried.
#[derive(Debug)]
pub struct RetryAttempt<'a> {
    /// Label of the operation, usually the peer URL.
    pub target: &'a str,
    /// 1-based number of the attempt that failed.
    pub attempt: u32,
    pub max_retry_count: u32,
    pub error: &'a LitError,
    pub next_delay: Duration,
}

/// Observes non-final failures.
pub trait RetryHook: Send + Sync {
    fn on_retry(&self, attempt: &RetryAttempt<'_>);
}

/// Logs each retry at `warn`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingRetryHook;

impl RetryHook for TracingRetryHook {
    fn on_retry(&self, attempt: &RetryAttempt<'_>) {
        tracing::warn!(
            target_url = attempt.target,
            attempt = attempt.attempt,
            max_retries = attempt.max_retry_count,
            delay_ms = attempt.next_delay.as_millis() as u64,
            error = %attempt.error,
            "request failed, retrying"
        );
    }
}

/// Run `op` under `policy`. `op` receives the 1-based attempt number.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    target: &str,
    hook: &dyn RetryHook,
    mut op: F,
) -> Result<T, LitError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LitError>>,
{
    let mut attempt = 1u32;
    loop {
        let result = match tokio::time::timeout(policy.timeout(), op(attempt)).await {
            Ok(result) => result,
            Err(_) => Err(LitError::network(
                target,
                format!("request timed out after {}ms", policy.timeout_ms),
            )),
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let retries_used = attempt - 1;
        if !error.is_transient() || retries_used >= policy.max_retry_count {
            return Err(error);
        }

        hook.on_retry(&RetryAttempt {
            target,
            attempt,
            max_retry_count: policy.max_retry_count,
            error: &error,
            next_delay: policy.interval(),
        });
        tokio::time::sleep(policy.interval()).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHook {
        attempts: Mutex<Vec<u32>>,
    }

    impl RetryHook for RecordingHook {
        fn on_retry(&self, attempt: &RetryAttempt<'_>) {
            self.attempts.lock().unwrap().push(attempt.attempt);
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let hook = RecordingHook::default();
        let policy = RetryPolicy::new(1_000, 3, 1);

        let result = execute_with_retry(&policy, "http://a", &hook, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LitError::network("http://a", "refused"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(*hook.attempts.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries_with_original_error() {
        let calls = AtomicU32::new(0);
        let hook = RecordingHook::default();
        let policy = RetryPolicy::new(1_000, 2, 1);

        let result: Result<(), _> = execute_with_retry(&policy, "http://a", &hook, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(LitError::network("http://a", format!("refused #{attempt}"))) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            result.unwrap_err(),
            LitError::network("http://a", "refused #3")
        );
        assert_eq!(hook.attempts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(1_000, 5, 1);

        let result: Result<(), _> =
            execute_with_retry(&policy, "http://a", &TracingRetryHook, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(LitError::NodeNotAuthorized("denied".into())) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(LitError::NodeNotAuthorized(_))));
    }

    #[tokio::test]
    async fn slow_attempts_time_out() {
        let policy = RetryPolicy::no_retry(20);
        let result: Result<(), _> =
            execute_with_retry(&policy, "http://slow", &TracingRetryHook, |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(LitError::Network { url, message }) => {
                assert_eq!(url, "http://slow");
                assert!(message.contains("timed out"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
