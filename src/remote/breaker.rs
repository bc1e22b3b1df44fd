//! Circuit breaker for the provisioning backend.
//!
//! State machine: `Closed` counts consecutive failures and opens at the
//! threshold; `Open` fails fast until the recovery timeout lapses, then
//! admits calls in `HalfOpen`; `HalfOpen` closes after enough successes
//! and reopens on any failure.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::{RemoteError, Result, StackweaverError};

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing.
    pub recovery_timeout: Duration,
    /// Successes in half-open required to close.
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
        }
    }
}

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation.
    Closed,
    /// Failing fast.
    Open,
    /// Probing recovery.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure: Option<Instant>,
}

/// Circuit breaker wrapping calls to an unreliable collaborator.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Creates a closed breaker with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure: None,
            }),
        }
    }

    /// Runs the operation under breaker protection.
    ///
    /// While open and within the recovery window the operation is not
    /// invoked at all; the call fails fast with a connection error.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.check()?;

        match operation().await {
            Ok(value) => {
                self.record_success()?;
                Ok(value)
            }
            Err(e) => {
                self.record_failure()?;
                Err(e)
            }
        }
    }

    /// Admits or refuses a call based on the current state.
    fn check(&self) -> Result<()> {
        let mut state = self.locked()?;

        if state.state == CircuitState::Open {
            let recovered = state
                .last_failure
                .is_none_or(|at| at.elapsed() >= self.config.recovery_timeout);
            if recovered {
                state.state = CircuitState::HalfOpen;
                state.success_count = 0;
                info!("Circuit breaker transitioning to half-open");
            } else {
                return Err(RemoteError::connection(
                    "Circuit breaker is open - too many failures",
                )
                .into());
            }
        }

        Ok(())
    }

    fn record_success(&self) -> Result<()> {
        let mut state = self.locked()?;

        if state.state == CircuitState::HalfOpen {
            state.success_count += 1;
            if state.success_count >= self.config.success_threshold {
                state.state = CircuitState::Closed;
                state.failure_count = 0;
                state.success_count = 0;
                info!("Circuit breaker reset to closed");
            }
        } else {
            state.failure_count = 0;
        }

        Ok(())
    }

    fn record_failure(&self) -> Result<()> {
        let mut state = self.locked()?;
        state.last_failure = Some(Instant::now());

        if state.state == CircuitState::HalfOpen {
            // A probe failure reopens immediately.
            state.state = CircuitState::Open;
            state.success_count = 0;
            warn!("Circuit breaker reopened by half-open failure");
            return Ok(());
        }

        state.failure_count += 1;
        if state.failure_count >= self.config.failure_threshold {
            state.state = CircuitState::Open;
            state.success_count = 0;
            warn!(
                "Circuit breaker opened after {} failures",
                state.failure_count
            );
        }

        Ok(())
    }

    /// Current breaker state.
    pub fn current_state(&self) -> Result<CircuitState> {
        Ok(self.locked()?.state)
    }

    fn locked(&self) -> Result<std::sync::MutexGuard<'_, BreakerState>> {
        self.state
            .lock()
            .map_err(|e| StackweaverError::internal(format!("circuit breaker poisoned: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold,
            recovery_timeout: recovery,
            success_threshold: 2,
        })
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result: Result<()> = breaker
            .call(|| async { Err(RemoteError::connection("boom").into()) })
            .await;
        assert!(result.is_err());
    }

    async fn succeed(breaker: &CircuitBreaker) {
        breaker.call(|| async { Ok(()) }).await.unwrap();
    }

    #[tokio::test]
    async fn test_opens_at_failure_threshold() {
        let breaker = breaker(3, Duration::from_secs(60));

        fail(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Closed);

        fail(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_open_fails_fast_without_invoking() {
        let breaker = breaker(1, Duration::from_secs(60));
        fail(&breaker).await;

        let mut invoked = false;
        let result: Result<()> = breaker
            .call(|| {
                invoked = true;
                async { Ok(()) }
            })
            .await;

        assert!(result.is_err());
        assert!(!invoked);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let breaker = breaker(2, Duration::from_secs(60));

        fail(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_closes_after_success_threshold() {
        let breaker = breaker(1, Duration::from_millis(0));
        fail(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Open);

        // Zero recovery timeout: next call probes in half-open.
        succeed(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::HalfOpen);
        succeed(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = breaker(1, Duration::from_millis(0));
        fail(&breaker).await;
        succeed(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::HalfOpen);

        fail(&breaker).await;
        assert_eq!(breaker.current_state().unwrap(), CircuitState::Open);
    }
}
