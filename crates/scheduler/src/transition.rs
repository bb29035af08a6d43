//! State machine transition validation for builds (§4.3 "State machine of
//! a build from the Scheduler's perspective").

use forge_core::types::BuildStatus;

/// Returns `true` if the build-level transition from `from` to `to` is
/// valid.
#[must_use]
pub fn can_transition_build(from: BuildStatus, to: BuildStatus) -> bool {
    matches!(
        (from, to),
        (BuildStatus::Pending, BuildStatus::Started)
            | (BuildStatus::Pending, BuildStatus::Errored)
            | (BuildStatus::Started, BuildStatus::Succeeded)
            | (BuildStatus::Started, BuildStatus::Failed)
            | (BuildStatus::Started, BuildStatus::Errored)
            | (BuildStatus::Started, BuildStatus::Aborted)
            | (BuildStatus::Pending, BuildStatus::Aborted)
    )
}
