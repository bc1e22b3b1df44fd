//! Retry with exponential backoff and jitter.

use std::time::Duration;

use tracing::{error, warn};

use crate::error::Result;

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub exponential_base: f64,
    /// Whether to jitter delays into `[0.5, 1.0]` of their value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Retry policy executing fallible async operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Creates a policy with the given configuration.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs the operation, retrying on failure with backoff.
    ///
    /// The last error is returned unchanged once retries are exhausted.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if attempt == self.config.max_retries {
                        error!("All retry attempts failed: {e}");
                        last_error = Some(e);
                        break;
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "Attempt {} failed: {e}. Retrying in {:.2}s",
                        attempt + 1,
                        delay.as_secs_f64()
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
            }
        }

        // The loop always runs at least once, so an error is recorded.
        Err(last_error
            .unwrap_or_else(|| crate::error::StackweaverError::internal("retry loop ran dry")))
    }

    /// Delay before retry `attempt + 1`: exponential growth, capped, then
    /// jittered into `[0.5, 1.0]` of the capped value.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponential =
            self.config.base_delay.as_secs_f64() * self.config.exponential_base.powi(
                i32::try_from(attempt).unwrap_or(i32::MAX),
            );
        let mut delay = exponential.min(self.config.max_delay.as_secs_f64());

        if self.config.jitter {
            delay *= 0.5 + fastrand::f64() * 0.5;
        }

        Duration::from_secs_f64(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{RemoteError, StackweaverError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32, jitter: bool) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            exponential_base: 2.0,
            jitter,
        })
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let policy = fast_policy(3, false);
        let attempts = AtomicU32::new(0);

        let result = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RemoteError::connection("transient").into())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = fast_policy(2, false);
        let attempts = AtomicU32::new(0);

        let err = policy
            .execute(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    Err::<(), _>(RemoteError::connection(format!("failure {n}")).into())
                }
            })
            .await
            .expect_err("retries exhausted");

        // max_retries = 2 means three attempts in total.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert!(matches!(
            err,
            StackweaverError::Remote(RemoteError::ConnectionFailed { .. })
        ));
        assert!(err.to_string().contains("failure 2"));
    }

    #[test]
    fn test_delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            exponential_base: 2.0,
            jitter: false,
        });

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_half_to_full() {
        let policy = RetryPolicy::new(RetryConfig {
            max_retries: 1,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(60),
            exponential_base: 2.0,
            jitter: true,
        });

        for _ in 0..100 {
            let delay = policy.delay_for(0).as_secs_f64();
            assert!((2.0..=4.0).contains(&delay));
        }
    }
}
