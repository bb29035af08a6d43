//! Exponential backoff retry, meant to sit outside a [`crate::CircuitBreaker`]
//! (retry the individual DB call, let the breaker track the aggregate
//! failure rate across retries).

use std::time::Duration;

use crate::core::{ResilienceError, ResilienceResult};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Fraction of the computed delay to randomise, avoiding thundering
    /// herds when many callers retry the same outage simultaneously.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl RetryConfig {
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let capped = exp.min(self.max_delay.as_millis() as f64);
        let jittered = capped * (1.0 - self.jitter + fastrand::f64() * self.jitter * 2.0);
        Duration::from_millis(jittered.max(0.0) as u64)
    }
}

/// Retry `operation` up to `config.max_attempts` times, stopping early if
/// `is_retryable` says the error is not worth retrying.
pub async fn retry<T, F, Fut>(config: &RetryConfig, mut is_retryable: impl FnMut(&ResilienceError) -> bool, mut operation: F) -> ResilienceResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ResilienceResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt + 1 < config.max_attempts && is_retryable(&err) => {
                let delay = config.delay_for(attempt);
                tracing::debug!(attempt, ?delay, error = %err, "retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(ResilienceError::RetriesExhausted { attempts: attempt + 1, source: Box::new(err) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), ..Default::default() };

        let result = retry(
            &config,
            |_| true,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ResilienceError::CircuitOpen { retry_after_ms: 0 })
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let config = RetryConfig { max_attempts: 2, base_delay: Duration::from_millis(1), ..Default::default() };

        let result: ResilienceResult<()> = retry(&config, |_| true, || async { Err(ResilienceError::CircuitOpen { retry_after_ms: 0 }) }).await;

        assert!(matches!(result, Err(ResilienceError::RetriesExhausted { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn stops_immediately_on_non_retryable_error() {
        let calls = AtomicU32::new(0);
        let config = RetryConfig { max_attempts: 5, base_delay: Duration::from_millis(1), ..Default::default() };

        let _ = retry::<(), _, _>(
            &config,
            |_| false,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ResilienceError::CircuitOpen { retry_after_ms: 0 }) }
            },
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
