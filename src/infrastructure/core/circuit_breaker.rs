//! Circuit breaker guarding calls to the broker API.
//!
//! Unlike a transport-agnostic breaker, failure classification here is
//! specific to `BrokerError`: only `Transient` failures count against
//! the trip threshold, since retrying an `Auth` rejection or a
//! `DataUnavailable` response can't restore broker health and would
//! otherwise trip the circuit for reasons a retry can't fix.

use crate::domain::errors::BrokerError;
use crate::domain::market::Candle;
use crate::infrastructure::observability::Metrics;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    state: Arc<RwLock<CircuitBreakerState>>,
    failure_threshold: usize,
    success_threshold: usize,
    timeout: Duration,
    name: String,
    metrics: Option<Arc<Metrics>>,
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: usize,
    success_count: usize,
    last_failure_time: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, failure_threshold: usize, success_threshold: usize, timeout: Duration) -> Self {
        Self {
            state: Arc::new(RwLock::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            })),
            failure_threshold,
            success_threshold,
            timeout,
            name: name.into(),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runs `f`, short-circuiting with a synthetic `Transient` error
    /// while open. `Auth` and `DataUnavailable` results pass straight
    /// through without affecting the trip count; only `Transient`
    /// failures move the circuit toward Open.
    pub async fn call<F>(&self, f: F) -> Result<Vec<Candle>, BrokerError>
    where
        F: std::future::Future<Output = Result<Vec<Candle>, BrokerError>>,
    {
        {
            let mut state = self.state.write().await;
            if state.state == CircuitState::Open {
                if let Some(last_failure) = state.last_failure_time {
                    if last_failure.elapsed() > self.timeout {
                        info!(
                            "CircuitBreaker [{}]: Transitioning Open -> HalfOpen (timeout elapsed)",
                            self.name
                        );
                        state.state = CircuitState::HalfOpen;
                        state.success_count = 0;
                        self.report_status(CircuitState::HalfOpen);
                    } else {
                        return Err(BrokerError::Transient {
                            reason: format!(
                                "circuit breaker [{}] is open, retry in {:?}",
                                self.name,
                                self.timeout - last_failure.elapsed()
                            ),
                        });
                    }
                }
            }
        }

        match f.await {
            Ok(result) => {
                self.on_success().await;
                Ok(result)
            }
            Err(BrokerError::Transient { reason }) => {
                self.on_failure().await;
                Err(BrokerError::Transient { reason })
            }
            Err(other) => Err(other),
        }
    }

    async fn on_success(&self) {
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.success_threshold {
                    info!(
                        "CircuitBreaker [{}]: Transitioning HalfOpen -> Closed ({} successes)",
                        self.name, state.success_count
                    );
                    state.state = CircuitState::Closed;
                    state.failure_count = 0;
                    state.success_count = 0;
                    drop(state);
                    self.report_status(CircuitState::Closed);
                    return;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                warn!(
                    "CircuitBreaker [{}]: Success recorded in Open state (unexpected)",
                    self.name
                );
            }
        }
    }

    async fn on_failure(&self) {
        let mut state = self.state.write().await;

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.failure_threshold {
                    error!(
                        "CircuitBreaker [{}]: Transitioning Closed -> Open ({} failures)",
                        self.name, state.failure_count
                    );
                    state.state = CircuitState::Open;
                    drop(state);
                    self.report_status(CircuitState::Open);
                    return;
                }
            }
            CircuitState::HalfOpen => {
                warn!(
                    "CircuitBreaker [{}]: Transitioning HalfOpen -> Open (failure during recovery)",
                    self.name
                );
                state.state = CircuitState::Open;
                state.success_count = 0;
                drop(state);
                self.report_status(CircuitState::Open);
                return;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    fn report_status(&self, state: CircuitState) {
        if let Some(metrics) = &self.metrics {
            metrics.set_circuit_breaker_status(&self.name, matches!(state, CircuitState::Open));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok() -> Result<Vec<Candle>, BrokerError> {
        Ok(vec![])
    }

    fn transient() -> Result<Vec<Candle>, BrokerError> {
        Err(BrokerError::Transient { reason: "boom".to_string() })
    }

    #[tokio::test]
    async fn circuit_opens_after_consecutive_transient_failures() {
        let cb = CircuitBreaker::new("test", 3, 2, Duration::from_secs(1));

        for _ in 0..3 {
            assert!(cb.call(async { transient() }).await.is_err());
        }

        assert_eq!(cb.state().await, CircuitState::Open);

        let result = cb.call(async { ok() }).await;
        assert!(matches!(result, Err(BrokerError::Transient { .. })));
    }

    #[tokio::test]
    async fn auth_failures_never_trip_the_circuit() {
        let cb = CircuitBreaker::new("test", 2, 2, Duration::from_secs(1));

        for _ in 0..10 {
            let result = cb.call(async { Err(BrokerError::Auth { reason: "bad token".to_string() }) }).await;
            assert!(matches!(result, Err(BrokerError::Auth { .. })));
        }

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn circuit_recovers_after_timeout() {
        let cb = CircuitBreaker::new("test", 2, 2, Duration::from_millis(100));

        for _ in 0..2 {
            let _ = cb.call(async { transient() }).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cb.call(async { ok() }).await.is_ok());
        assert!(cb.call(async { ok() }).await.is_ok());
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn halfopen_reopens_on_failure() {
        let cb = CircuitBreaker::new("test", 2, 2, Duration::from_millis(100));

        for _ in 0..2 {
            let _ = cb.call(async { transient() }).await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;

        let _ = cb.call(async { transient() }).await;

        assert_eq!(cb.state().await, CircuitState::Open);
    }
}
