//! Retryable trait for domain errors.
//!
//! Domain errors implement this to tell [`crate::retry`]/[`crate::CircuitBreaker`]
//! whether they're worth retrying, without this crate knowing anything about
//! the domain's error type. This is the only point of contact between this
//! crate and a caller's error enum — no central error type.

use std::error::Error;

/// Whether an error is worth retrying.
///
/// Default: `true`, matching the common case of a transient I/O failure.
/// Domain errors with precondition/permanent variants should override this.
pub trait Retryable: Error {
    fn is_retryable(&self) -> bool {
        true
    }
}
