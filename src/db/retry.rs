use std::future::Future;
use std::time::Duration;
use tracing::{error, warn};

use crate::utils::errors::StoreError;

/// Bounded retry with a fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    /// Limit on a single attempt; `None` waits indefinitely
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Reads: 3 attempts, 1 s apart, 30 s each
    pub const FETCH: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_secs(1),
        attempt_timeout: Some(Duration::from_secs(30)),
    };

    /// Table swaps: 3 attempts, 1 s apart
    pub const REPLACE: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_secs(1),
        attempt_timeout: None,
    };

    /// Bulk writes: 5 attempts, 1 s apart
    pub const WRITE: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        delay: Duration::from_secs(1),
        attempt_timeout: None,
    };
}

/// Run `operation` until it succeeds or the policy is exhausted
///
/// Only transient errors (timeouts, database errors) are retried. Once every
/// attempt has failed the last error is returned inside
/// `StoreError::RetryExhausted`.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, name: &str, mut operation: F) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let result = match policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, operation())
                .await
                .unwrap_or(Err(StoreError::Timeout(limit.as_secs()))),
            None => operation().await,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) if attempt >= attempts => {
                error!("'{}' failed after {} attempts: {}", name, attempts, e);
                return Err(StoreError::RetryExhausted {
                    operation: name.to_string(),
                    attempts,
                    source: Box::new(e),
                });
            }
            Err(e) => {
                warn!(
                    "'{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                    name, attempt, attempts, e, policy.delay
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            delay: Duration::from_millis(1),
            attempt_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = with_retry(quick(3), "fetch prices", || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(StoreError::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_carry_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(quick(5), "write prices", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Database(sqlx::Error::PoolClosed)) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result.unwrap_err() {
            StoreError::RetryExhausted { operation, attempts, source } => {
                assert_eq!(operation, "write prices");
                assert_eq!(attempts, 5);
                assert!(matches!(*source, StoreError::Database(sqlx::Error::PoolClosed)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = with_retry(quick(3), "fetch", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::TableNotFound("prices".to_string())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(StoreError::TableNotFound(_))));
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let policy = RetryPolicy {
            max_attempts: 2,
            delay: Duration::from_millis(1),
            attempt_timeout: Some(Duration::from_millis(20)),
        };

        let result: Result<(), _> = with_retry(policy, "slow", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        match result.unwrap_err() {
            StoreError::RetryExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, StoreError::Timeout(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let result = with_retry(quick(0), "once", || async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
