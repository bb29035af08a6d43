//! Shared error taxonomy for the control plane.
//!
//! Mirrors the precondition / transient / engine-scanner / programmer
//! split from the specification's error handling design: preconditions get
//! their own named variants, DB failures wrap through, and version-parse
//! failures never reach this type at all (they are logged and folded into
//! `false`/incompatible at the call site).

use thiserror::Error;

/// Result type used throughout the control-plane crates.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Precondition and infrastructural errors shared across the resolver,
/// worker pool, and scheduler.
#[derive(Debug, Error)]
pub enum CoreError {
    /// `FindOrCreate` was asked for a base resource type that doesn't exist.
    #[error("base resource type not found: {0}")]
    BaseResourceTypeNotFound(String),

    /// `allCompatible` found no workers registered at all.
    #[error("no workers registered")]
    NoWorkers,

    /// `allCompatible` found workers, but none matched the placement spec.
    #[error("no compatible workers for spec")]
    NoCompatibleWorkers,

    /// A pending build's recorded inputs no longer match the job's
    /// currently configured trigger inputs.
    #[error("predetermined inputs differ from configuration")]
    PredeterminedInputsDifferFromConfiguration,

    /// The database layer returned an error. Transient; the next tick
    /// retries.
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// An external collaborator (Scanner, Engine, Build Factory, Placement
    /// Strategy) failed. Carries the collaborator's own message; the
    /// caller is responsible for deciding whether this errors a build or
    /// short-circuits a tick.
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        /// Which external collaborator failed.
        collaborator: &'static str,
        /// The collaborator's error message.
        message: String,
    },

    /// JSON (de)serialization of an opaque version/params/metadata
    /// document failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A long-running entry point observed its cancellation token fire
    /// (§5 "Cancellation"). The current DB statement still completes;
    /// no partial build creation survives.
    #[error("operation cancelled")]
    Cancelled,
}

impl CoreError {
    /// Wrap a collaborator failure, tagging it with the collaborator's name
    /// for logging and error messages.
    pub fn collaborator(name: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            collaborator: name,
            message: err.to_string(),
        }
    }

    /// `true` for errors the next scheduler tick should simply retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

impl forge_resilience::Retryable for CoreError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_resource_type_not_found_message() {
        let err = CoreError::BaseResourceTypeNotFound("git".into());
        assert_eq!(err.to_string(), "base resource type not found: git");
        assert!(!err.is_retryable());
    }

    #[test]
    fn collaborator_error_carries_name_and_message() {
        let err = CoreError::collaborator("scanner", "timed out");
        assert_eq!(err.to_string(), "scanner failed: timed out");
    }

    #[test]
    fn precondition_errors_are_not_retryable() {
        assert!(!CoreError::NoWorkers.is_retryable());
        assert!(!CoreError::NoCompatibleWorkers.is_retryable());
        assert!(!CoreError::PredeterminedInputsDifferFromConfiguration.is_retryable());
    }

    #[test]
    fn retryable_impl_agrees_with_the_inherent_method() {
        use forge_resilience::Retryable;

        assert!(!Retryable::is_retryable(&CoreError::BaseResourceTypeNotFound("git".into())));
        assert!(!Retryable::is_retryable(&CoreError::NoWorkers));
    }
}
