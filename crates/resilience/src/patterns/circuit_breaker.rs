//! Circuit breaker guarding the DB Gateway boundary.
//!
//! A sliding-window failure-rate breaker with three states (closed, open,
//! half-open). Runtime-configured rather than const-generic: the original
//! lineage parameterized thresholds at the type level, which bought
//! compile-time validation at the cost of a type per configuration; a
//! single `forge-db` gateway only ever needs one configuration per process,
//! so the const generics are dropped in favour of a plain struct.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::core::{ErrorClass, ResilienceError, ResilienceResult};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    const fn to_atomic(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    const fn from_atomic(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures-in-window required to trip the circuit from closed to open.
    pub failure_rate_threshold: f64,
    /// Minimum operations observed in the window before the rate is trusted.
    pub min_operations: usize,
    /// How long the circuit stays open before probing with a half-open trial.
    pub reset_timeout: Duration,
    /// Trial operations allowed while half-open.
    pub half_open_max_operations: usize,
    /// Window over which the failure rate is computed.
    pub sliding_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.6,
            min_operations: 10,
            reset_timeout: Duration::from_secs(30),
            half_open_max_operations: 3,
            sliding_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    at: Instant,
    failed: bool,
}

#[derive(Debug)]
struct SlidingWindow {
    entries: VecDeque<WindowEntry>,
    window: Duration,
}

impl SlidingWindow {
    fn new(window: Duration) -> Self {
        Self { entries: VecDeque::new(), window }
    }

    fn record(&mut self, failed: bool) {
        let now = Instant::now();
        while matches!(self.entries.front(), Some(e) if now.duration_since(e.at) > self.window) {
            self.entries.pop_front();
        }
        self.entries.push_back(WindowEntry { at: now, failed });
    }

    fn stats(&self) -> (usize, f64) {
        let now = Instant::now();
        let live: Vec<_> = self.entries.iter().filter(|e| now.duration_since(e.at) <= self.window).collect();
        let total = live.len();
        if total == 0 {
            return (0, 0.0);
        }
        let failures = live.iter().filter(|e| e.failed).count();
        (total, failures as f64 / total as f64)
    }
}

struct Inner {
    config: CircuitBreakerConfig,
    state: State,
    atomic_state: Arc<AtomicU8>,
    window: SlidingWindow,
    half_open_operations: usize,
    opened_at: Option<Instant>,
}

impl Inner {
    fn set_state(&mut self, state: State) {
        self.state = state;
        self.atomic_state.store(state.to_atomic(), Ordering::Release);
        if state == State::Open {
            self.opened_at = Some(Instant::now());
        }
    }
}

/// Wraps an operation in a sliding-window circuit breaker.
pub struct CircuitBreaker {
    inner: Arc<RwLock<Inner>>,
    atomic_state: Arc<AtomicU8>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker").field("state", &State::from_atomic(self.atomic_state.load(Ordering::Acquire))).finish()
    }
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let atomic_state = Arc::new(AtomicU8::new(State::Closed.to_atomic()));
        let window = SlidingWindow::new(config.sliding_window);
        let inner = Inner {
            config,
            state: State::Closed,
            atomic_state: Arc::clone(&atomic_state),
            window,
            half_open_operations: 0,
            opened_at: None,
        };
        Self { inner: Arc::new(RwLock::new(inner)), atomic_state }
    }

    #[must_use]
    pub fn state(&self) -> State {
        State::from_atomic(self.atomic_state.load(Ordering::Acquire))
    }

    /// Run `operation` if the circuit allows it, recording the outcome.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = ResilienceResult<T>>,
    {
        // Fast path: most calls happen while closed, so read the atomic
        // without taking the lock.
        if self.state() == State::Closed {
            let result = operation().await;
            self.record(result.is_err()).await;
            return result;
        }

        let mut guard = self.inner.write().await;
        match guard.state {
            State::Open => {
                let elapsed = guard.opened_at.map_or(Duration::ZERO, |t| t.elapsed());
                if elapsed < guard.config.reset_timeout {
                    let retry_after_ms = (guard.config.reset_timeout - elapsed).as_millis() as u64;
                    return Err(ResilienceError::CircuitOpen { retry_after_ms });
                }
                guard.set_state(State::HalfOpen);
                guard.half_open_operations = 0;
            }
            State::HalfOpen => {
                if guard.half_open_operations >= guard.config.half_open_max_operations {
                    return Err(ResilienceError::CircuitOpen { retry_after_ms: 0 });
                }
            }
            State::Closed => {}
        }
        guard.half_open_operations += 1;
        drop(guard);

        let result = operation().await;
        self.record(result.is_err()).await;
        result
    }

    async fn record(&self, failed: bool) {
        let mut guard = self.inner.write().await;
        guard.window.record(failed);
        let (total, rate) = guard.window.stats();

        match guard.state {
            State::Closed => {
                if total >= guard.config.min_operations && rate >= guard.config.failure_rate_threshold {
                    guard.set_state(State::Open);
                    tracing::warn!(failure_rate = rate, "circuit breaker tripped open");
                }
            }
            State::HalfOpen => {
                if failed {
                    guard.set_state(State::Open);
                } else if guard.half_open_operations >= guard.config.half_open_max_operations {
                    guard.set_state(State::Closed);
                    tracing::info!("circuit breaker closed after successful half-open trial");
                }
            }
            State::Open => {}
        }
    }
}

impl ResilienceError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_op() -> impl std::future::Future<Output = ResilienceResult<u32>> {
        async { Ok(7) }
    }

    fn err_op() -> impl std::future::Future<Output = ResilienceResult<u32>> {
        async { Err(ResilienceError::CircuitOpen { retry_after_ms: 0 }) }
    }

    #[tokio::test]
    async fn stays_closed_under_low_failure_rate() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig { min_operations: 4, ..Default::default() });
        for _ in 0..10 {
            let _ = cb.execute(ok_op).await;
        }
        assert_eq!(cb.state(), State::Closed);
    }

    #[tokio::test]
    async fn trips_open_past_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            min_operations: 4,
            failure_rate_threshold: 0.5,
            ..Default::default()
        });
        for _ in 0..5 {
            let _ = cb.execute(err_op).await;
        }
        assert_eq!(cb.state(), State::Open);
    }

    #[tokio::test]
    async fn open_circuit_rejects_without_calling_operation() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            min_operations: 1,
            failure_rate_threshold: 0.1,
            reset_timeout: Duration::from_secs(60),
            ..Default::default()
        });
        let _ = cb.execute(err_op).await;
        assert_eq!(cb.state(), State::Open);

        let result = cb.execute(ok_op).await;
        assert!(matches!(result, Err(ResilienceError::CircuitOpen { .. })));
    }
}
