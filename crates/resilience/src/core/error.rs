//! Error classification shared by every resilience pattern.

use thiserror::Error;

/// Coarse classification used to decide whether a failure counts against a
/// circuit breaker / is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient: worth retrying, counts as a circuit-breaker failure.
    Transient,
    /// The circuit is already open; the caller should back off without
    /// counting this as a new failure.
    CircuitOpen,
    /// Permanent: retrying will not help (e.g. a `NOT NULL` violation).
    Permanent,
}

#[derive(Debug, Error)]
pub enum ResilienceError {
    #[error("circuit breaker is open, retry after {retry_after_ms}ms")]
    CircuitOpen { retry_after_ms: u64 },

    #[error("operation exhausted {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{source}")]
    Inner {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
        /// Carried from the wrapped error's own [`super::Retryable::is_retryable`]
        /// at the point it was boxed — type erasure loses the concrete type,
        /// so this has to be captured up front rather than recovered later.
        retryable: bool,
    },
}

impl ResilienceError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::CircuitOpen { .. } => ErrorClass::CircuitOpen,
            Self::RetriesExhausted { .. } => ErrorClass::Transient,
            Self::Inner { retryable, .. } => {
                if *retryable {
                    ErrorClass::Transient
                } else {
                    ErrorClass::Permanent
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner(retryable: bool) -> ResilienceError {
        ResilienceError::Inner { source: Box::new(std::fmt::Error), retryable }
    }

    #[test]
    fn retryable_inner_is_transient() {
        assert_eq!(inner(true).class(), ErrorClass::Transient);
    }

    #[test]
    fn non_retryable_inner_is_permanent() {
        assert_eq!(inner(false).class(), ErrorClass::Permanent);
    }

    #[test]
    fn circuit_open_is_its_own_class() {
        let err = ResilienceError::CircuitOpen { retry_after_ms: 100 };
        assert_eq!(err.class(), ErrorClass::CircuitOpen);
    }
}
