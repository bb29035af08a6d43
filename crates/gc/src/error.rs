//! Multi-error accumulation for sweepers (§4.4: "accumulate errors per
//! sub-step... so one failing sub-step does not suppress the other").

use forge_core::error::CoreError;

/// The errors a single sweeper run accumulated. Empty iff the run was
/// clean; row-lock conflicts are not errors and never appear here.
#[derive(Debug, Default)]
pub struct SweepError {
    causes: Vec<CoreError>,
}

impl SweepError {
    fn push(&mut self, err: CoreError) {
        self.causes.push(err);
    }

    /// `Ok(())` if nothing failed, else `Err(self)`.
    fn into_result(self) -> Result<(), Self> {
        if self.causes.is_empty() { Ok(()) } else { Err(self) }
    }

    /// The accumulated causes, in the order they occurred.
    #[must_use]
    pub fn causes(&self) -> &[CoreError] {
        &self.causes
    }
}

/// Accumulates per-row failures across a sweep; `finish()` turns it into
/// the `Ok(())`/`Err(SweepError)` a sweeper's `run()` returns.
#[derive(Debug, Default)]
pub(crate) struct SweepErrors(SweepError);

impl SweepErrors {
    pub(crate) fn record(&mut self, id: forge_core::CheckSessionId, outcome: forge_core::error::Result<bool>) {
        match outcome {
            Ok(true) => {}
            Ok(false) => tracing::debug!(check_session = %id, "row locked by a concurrent writer, deferring to next cycle"),
            Err(err) => {
                tracing::warn!(check_session = %id, error = %err, "failed to delete check session");
                self.0.push(err);
            }
        }
    }

    pub(crate) fn finish(self) -> Result<(), SweepError> {
        self.0.into_result()
    }
}

impl std::fmt::Display for SweepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} sweep error(s): ", self.causes.len())?;
        for (i, cause) in self.causes.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SweepError {}

impl From<CoreError> for SweepError {
    fn from(err: CoreError) -> Self {
        Self { causes: vec![err] }
    }
}

/// Returns `Err` if `cancel` has fired (§5 "Cancellation"). Checked between
/// DB round-trips, never mid-statement — a row delete already issued always
/// completes.
pub(crate) fn check_cancelled(cancel: &tokio_util::sync::CancellationToken) -> Result<(), SweepError> {
    if cancel.is_cancelled() { Err(SweepError::from(CoreError::Cancelled)) } else { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sweep_error_displays_nothing() {
        let err = SweepError::default();
        assert_eq!(err.to_string(), "0 sweep error(s): ");
    }

    #[test]
    fn joins_multiple_causes() {
        let mut err = SweepError::default();
        err.push(CoreError::NoWorkers);
        err.push(CoreError::NoCompatibleWorkers);
        assert_eq!(err.causes().len(), 2);
        assert!(err.to_string().contains("no workers registered"));
        assert!(err.to_string().contains("no compatible workers"));
    }
}
