//! A minimal release-version parser matching `go-semi-semantic`'s narrow
//! comparison: no semver pre-release/build metadata handling, just a
//! dot-separated run of numeric components.
//!
//! A hand-rolled type rather than a general semver crate, since the pool
//! only ever needs the exact comparison `isWorkerVersionCompatible`
//! performs: whole-release equality/ordering, and (on a higher worker
//! version) equality of the first component only.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    components: Vec<u64>,
}

impl ReleaseVersion {
    /// Parse a dot-separated run of non-negative integers (e.g. `"2.4.0"`).
    /// Returns `None` on anything else, matching the original's
    /// "log and treat as incompatible" failure mode (§4.2 "Failure
    /// semantics") — the caller never sees this as an error.
    pub fn parse(raw: &str) -> Option<Self> {
        let components = raw
            .split('.')
            .map(|part| part.parse::<u64>().ok())
            .collect::<Option<Vec<u64>>>()?;
        if components.is_empty() {
            return None;
        }
        Some(Self { components })
    }

    #[must_use]
    pub fn first_component(&self) -> u64 {
        self.components[0]
    }
}

impl PartialOrd for ReleaseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ReleaseVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                std::cmp::Ordering::Equal => continue,
                ord => return ord,
            }
        }
        std::cmp::Ordering::Equal
    }
}

/// `true` iff `worker_version` is compatible with `target`, per
/// `isWorkerVersionCompatible`: equal releases are compatible; a strictly
/// lower worker release is not; a strictly higher worker release is
/// compatible only if its first component matches the target's.
#[must_use]
pub fn is_compatible(worker_version: &ReleaseVersion, target: &ReleaseVersion) -> bool {
    match worker_version.cmp(target) {
        std::cmp::Ordering::Equal => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Greater => worker_version.first_component() == target.first_component(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_components() {
        let v = ReleaseVersion::parse("2.4.0").unwrap();
        assert_eq!(v.components, vec![2, 4, 0]);
    }

    #[test]
    fn rejects_non_numeric_components() {
        assert!(ReleaseVersion::parse("2.4.0-rc1").is_none());
        assert!(ReleaseVersion::parse("").is_none());
    }

    #[test]
    fn equal_releases_are_compatible() {
        let target = ReleaseVersion::parse("2.4.0").unwrap();
        let worker = ReleaseVersion::parse("2.4.0").unwrap();
        assert!(is_compatible(&worker, &target));
    }

    #[test]
    fn strictly_lower_worker_is_incompatible() {
        let target = ReleaseVersion::parse("2.4.0").unwrap();
        let worker = ReleaseVersion::parse("2.3.9").unwrap();
        assert!(!is_compatible(&worker, &target));
    }

    #[test]
    fn higher_worker_compatible_only_if_major_matches() {
        let target = ReleaseVersion::parse("2.4.0").unwrap();
        let same_major = ReleaseVersion::parse("2.9.0").unwrap();
        let different_major = ReleaseVersion::parse("3.0.0").unwrap();
        assert!(is_compatible(&same_major, &target));
        assert!(!is_compatible(&different_major, &target));
    }
}
