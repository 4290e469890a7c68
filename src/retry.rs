//! Retry executor shared by every external call.
//!
//! Wraps exactly one network call. Backoff follows [`RetryPolicy::backoff`]:
//! with the default policy the waits are 2 s then 4 s, capped at 30 s, and the
//! final error is returned unchanged once attempts are exhausted.

use crate::config::{RetryPolicy, RetryScope};
use crate::error::ServiceError;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Run `call` until it succeeds, the error is not retryable under
/// `policy.scope`, or `policy.max_attempts` attempts have been made.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut call: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{operation}: succeeded on attempt {attempt}");
                }
                return Ok(value);
            }
            Err(e) => {
                let retryable = match policy.scope {
                    RetryScope::TransientOnly => e.is_retryable(),
                    RetryScope::AllErrors => true,
                };
                if !retryable || attempt >= max_attempts {
                    if !retryable {
                        debug!("{operation}: permanent failure, not retrying: {e}");
                    }
                    return Err(e);
                }

                let backoff = policy.backoff(attempt);
                warn!(
                    "{operation}: attempt {}/{} failed - {}; retrying in {:?}",
                    attempt, max_attempts, e, backoff
                );
                sleep(backoff).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status(code: u16) -> ServiceError {
        ServiceError::Status {
            service: "test",
            status: code,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&RetryPolicy::immediate(3), "op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(status(503))
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts_with_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::immediate(3), "op", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(status(500 + n as u16))
        })
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result.unwrap_err() {
            ServiceError::Status { status, .. } => assert_eq!(status, 503),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&RetryPolicy::immediate(3), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(status(400))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn all_errors_scope_retries_permanent_errors() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            scope: RetryScope::AllErrors,
            ..RetryPolicy::immediate(3)
        };
        let result: Result<(), _> = with_retry(&policy, "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(status(400))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
