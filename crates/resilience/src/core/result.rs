//! Extension trait for classifying and wrapping arbitrary `Result`s so they
//! can flow through [`crate::circuit_breaker::CircuitBreaker`] and
//! [`crate::retry`].

use std::fmt;

use super::error::{ErrorClass, ResilienceError};
use super::retryable::Retryable;

pub type ResilienceResult<T> = Result<T, ResilienceError>;

pub trait ResultExt<T> {
    /// Map error with context, lazily formatted.
    fn with_context<C, F>(self, f: F) -> ResilienceResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C;

    /// Box the error into a [`ResilienceError::Inner`], preserving its own
    /// [`Retryable::is_retryable`] verdict.
    fn into_resilience(self) -> ResilienceResult<T>;

    /// Whether this result, if an error, should be retried.
    fn is_retryable_error(&self) -> bool;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Retryable + Send + Sync + 'static,
{
    fn with_context<C, F>(self, f: F) -> ResilienceResult<T>
    where
        C: fmt::Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| {
            let retryable = e.is_retryable();
            ResilienceError::Inner {
                source: Box::new(ContextError { context: f().to_string(), source: Box::new(e) }),
                retryable,
            }
        })
    }

    fn into_resilience(self) -> ResilienceResult<T> {
        self.map_err(|e| {
            let retryable = e.is_retryable();
            ResilienceError::Inner { source: Box::new(e), retryable }
        })
    }

    fn is_retryable_error(&self) -> bool {
        match self {
            Ok(_) => false,
            Err(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug)]
struct ContextError {
    context: String,
    source: Box<dyn std::error::Error + Send + Sync>,
}

impl fmt::Display for ContextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.source)
    }
}

impl std::error::Error for ContextError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Exposed for patterns that want to classify an already-built
/// [`ResilienceError`] rather than an arbitrary `Result`.
#[must_use]
pub fn classify(err: &ResilienceError) -> ErrorClass {
    err.class()
}
