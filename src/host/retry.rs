//! Bounded retry for hosting API calls

use super::HostError;
use crate::logging::Logger;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

/// Linear backoff retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    pub base_backoff_ms: u64,
    /// Longest server-requested wait honoured before giving up
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_backoff_ms: 500,
            max_wait: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying after the given (1-based) failed attempt
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        Duration::from_millis(self.base_backoff_ms.saturating_mul(attempt as u64))
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out
    pub async fn run<T, F, Fut>(&self, logger: &Logger, operation: &str, op: F) -> Result<T, HostError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        self.run_if(logger, operation, HostError::is_transient, op)
            .await
    }

    /// `run`, retrying only the failures `retryable` accepts
    pub async fn run_if<T, F, Fut>(
        &self,
        logger: &Logger,
        operation: &str,
        retryable: fn(&HostError) -> bool,
        mut op: F,
    ) -> Result<T, HostError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if !retryable(&error) || attempt >= max_attempts {
                return Err(error);
            }

            let delay = match error {
                HostError::RateLimited { retry_after_secs } => {
                    let wait = Duration::from_secs(retry_after_secs);
                    if wait > self.max_wait {
                        let payload = json!({
                            "operation": operation,
                            "retry_after_secs": retry_after_secs,
                        });
                        logger.error("rate limit reset is beyond the retry window", Some(&payload));
                        return Err(error);
                    }
                    wait
                }
                _ => self.delay_for_attempt(attempt),
            };

            logger.warn(
                &format!("{} failed (attempt {}): {}", operation, attempt, error),
                Some(&json!({ "delay_ms": delay.as_millis() as u64 })),
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_backoff_ms: 1,
            max_wait: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result = fast_policy(3)
            .run(&logger, "get thing", || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(HostError::Api {
                        status: 502,
                        message: "bad gateway".to_string(),
                    })
                } else {
                    Ok(7)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result: Result<(), _> = fast_policy(3)
            .run(&logger, "get thing", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HostError::RateLimited { retry_after_secs: 0 })
            })
            .await;

        assert!(matches!(result, Err(HostError::RateLimited { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result: Result<(), _> = fast_policy(5)
            .run(&logger, "get thing", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HostError::NotFound)
            })
            .await;

        assert!(matches!(result, Err(HostError::NotFound)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_creates_are_not_replayed_after_server_errors() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result: Result<(), _> = fast_policy(5)
            .run_if(&logger, "POST issues", HostError::is_rejected, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HostError::Api {
                    status: 502,
                    message: "bad gateway".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(HostError::Api { status: 502, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_creates_are_replayed_after_rate_limits() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result = fast_policy(3)
            .run_if(&logger, "POST issues", HostError::is_rejected, || async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(HostError::RateLimited { retry_after_secs: 0 })
                } else {
                    Ok(11)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_long_retry_after_fails_fast() {
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let logger = Logger::new("test");

        let result: Result<(), _> = fast_policy(5)
            .run(&logger, "get thing", || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HostError::RateLimited {
                    retry_after_secs: 3600,
                })
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
