//! Retry with backoff, shared by the metrics fetch and delivery paths.

use std::future::Future;
use std::time::Duration;

use crate::error::{PulsecardError, Result};

/// A bounded retry policy: how many attempts, and how long to wait
/// before each re-attempt.
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before retry number `n` (1-based).
    pub backoff: fn(u32) -> Duration,
}

impl RetryPolicy {
    /// Delivery default: 3 attempts, retry n waits n × 2s.
    pub fn delivery() -> Self {
        Self {
            max_attempts: 3,
            backoff: |n| Duration::from_secs(2 * n as u64),
        }
    }

    /// Metrics fetch default: 3 attempts with a short linear backoff.
    pub fn metrics() -> Self {
        Self {
            max_attempts: 3,
            backoff: |n| Duration::from_millis(500 * n as u64),
        }
    }

    /// Run `op` until it succeeds, the error is not retryable, or the
    /// attempt budget is spent. Returns the last error on exhaustion.
    pub async fn run<T, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&PulsecardError) -> bool,
    {
        let mut last_err = None;
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = (self.backoff)(attempt);
                tracing::debug!(
                    "Retry {}/{} after {:?}: {}",
                    attempt,
                    self.max_attempts - 1,
                    delay,
                    last_err.as_ref().map(|e: &PulsecardError| e.to_string()).unwrap_or_default()
                );
                tokio::time::sleep(delay).await;
            }
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) if retryable(&e) => last_err = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_err.expect("at least one attempt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: |_| Duration::from_millis(1),
        };
        let result = policy
            .run(
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(PulsecardError::DeliveryTransport("flaky".into()))
                        } else {
                            Ok(42)
                        }
                    }
                },
                PulsecardError::is_retryable,
            )
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff: |_| Duration::from_millis(1),
        };
        let result: Result<()> = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(PulsecardError::DeliveryTransport("down".into())) }
                },
                PulsecardError::is_retryable,
            )
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::delivery();
        let result: Result<()> = policy
            .run(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(PulsecardError::ConfigMissing("no task".into())) }
                },
                PulsecardError::is_retryable,
            )
            .await;
        assert!(matches!(result, Err(PulsecardError::ConfigMissing(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
