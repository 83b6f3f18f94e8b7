use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout_ms: u64,
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout_ms: 30_000, success_threshold: 2 }
    }
}

struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    opened_at: Option<Instant>,
}

/// Per-model circuit breaker guarding a backing model gateway.
pub struct CircuitBreaker {
    model_id: String,
    config: CircuitBreakerConfig,
    inner: RwLock<CircuitInner>,
}

impl CircuitBreaker {
    pub fn new(model_id: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            model_id: model_id.into(),
            config,
            inner: RwLock::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                opened_at: None,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.read().state
    }

    /// Returns an error if the breaker rejects the call outright, otherwise
    /// transitions `Open -> HalfOpen` once the recovery timeout has elapsed.
    pub fn admit(&self) -> Result<(), ModelError> {
        let mut inner = self.inner.write();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed > Duration::from_millis(self.config.recovery_timeout_ms) {
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    info!(model_id = %self.model_id, "circuit transitioning to half-open");
                    Ok(())
                } else {
                    Err(ModelError::CircuitOpen { model_id: self.model_id.clone() })
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_failures = 0;
        match inner.state {
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    info!(model_id = %self.model_id, "circuit closed after recovery");
                }
            }
            CircuitState::Closed => {}
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.write();
        inner.consecutive_successes = 0;
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.config.failure_threshold && inner.state != CircuitState::Open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            warn!(model_id = %self.model_id, failures = inner.consecutive_failures, "circuit opened");
        } else if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
        }
    }
}

pub struct CircuitBreakerRegistry {
    breakers: dashmap::DashMap<String, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { breakers: dashmap::DashMap::new(), config }
    }

    pub fn get(&self, model_id: &str) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(model_id.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(model_id, self.config.clone())))
            .clone()
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

/// Retry policy: the initial attempt plus up to `max_retries` further
/// tries on transient errors (spec §4.6's `R=3` retries, 4 attempts
/// total), exponential backoff `base * 2^attempt` with uniform jitter in
/// `[0, backoff)` added on top.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 200, max_delay_ms: 10_000 }
    }
}

pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let raw = config.base_delay_ms as f64 * 2f64.powi(attempt as i32);
    let capped = raw.min(config.max_delay_ms as f64);
    let jitter = capped * rand::random::<f64>();
    Duration::from_millis((capped * 0.5 + jitter * 0.5) as u64)
}

/// Retries `operation` on transient `ModelError`s, stopping immediately on
/// a permanent one. Returns the last transient error once attempts are
/// exhausted.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, ModelError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, ModelError>>,
{
    let mut attempt = 0;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < config.max_retries => {
                let delay = backoff_delay(config, attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying after transient model error");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn circuit_opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new("m1", CircuitBreakerConfig { failure_threshold: 2, ..Default::default() });
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.admit().is_err());
    }

    #[test]
    fn circuit_closes_after_recovery_successes() {
        let breaker = CircuitBreaker::new(
            "m1",
            CircuitBreakerConfig { failure_threshold: 1, recovery_timeout_ms: 0, success_threshold: 1 },
        );
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker.admit().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn with_retry_stops_immediately_on_permanent_error() {
        let config = RetryConfig { max_retries: 3, base_delay_ms: 1, max_delay_ms: 2 };
        let calls = AtomicU32::new(0);
        let result: Result<(), ModelError> = with_retry(&config, |_attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ModelError::Permanent("bad request".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn with_retry_succeeds_after_transient_failures() {
        let config = RetryConfig { max_retries: 3, base_delay_ms: 1, max_delay_ms: 2 };
        let calls = AtomicU32::new(0);
        let result = with_retry(&config, |attempt| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ModelError::Transient(format!("attempt {attempt}")))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn with_retry_makes_four_attempts_total_on_persistent_transient_errors() {
        let config = RetryConfig { max_retries: 3, base_delay_ms: 1, max_delay_ms: 2 };
        let calls = AtomicU32::new(0);
        let result: Result<(), ModelError> = with_retry(&config, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(ModelError::Transient(format!("attempt {attempt}"))) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
