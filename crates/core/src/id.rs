//! Identifiers for control-plane entities.
//!
//! Every entity here is a row in the durable store behind the [`DbGateway`]
//! abstraction (see [`crate::ports`]), so ids are surrogate integers rather
//! than content-addressed values — content addressing is reserved for
//! [`crate::hash`], which derives `version_md5`/`params_hash`/`source_hash`.
//!
//! Each id type is `Copy`, implements `Display`/`FromStr`, and serializes as
//! a bare integer so it round-trips through `sqlx` and `serde_json` without
//! ceremony.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// The raw integer value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Identifies a `resource_configs` row: `(parent, source_hash)`.
    ResourceConfigId
);
define_id!(
    /// Identifies a `resource_caches` row: `(resource_config_id, version_md5, params_hash)`.
    ResourceCacheId
);
define_id!(
    /// Identifies a job build.
    BuildId
);
define_id!(
    /// Identifies a job within a pipeline.
    JobId
);
define_id!(
    /// Identifies a registered worker.
    WorkerId
);
define_id!(
    /// Identifies a base resource type (built-in plugin).
    BaseResourceTypeId
);
define_id!(
    /// Identifies a resource (named pipeline input/output).
    ResourceId
);
define_id!(
    /// Identifies a `resource_config_check_sessions` row (§4.4 GC sweepers).
    CheckSessionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_roundtrip() {
        let id = BuildId::new(128);
        assert_eq!(id.to_string(), "128");
        assert_eq!("128".parse::<BuildId>().unwrap(), id);
    }

    #[test]
    fn from_i64() {
        let id: ResourceCacheId = 7.into();
        assert_eq!(id.get(), 7);
    }

    #[test]
    fn serde_roundtrip_is_a_bare_integer() {
        let id = JobId::new(42);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "42");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ordering_matches_integer_ordering() {
        assert!(WorkerId::new(1) < WorkerId::new(2));
    }

    #[test]
    fn distinct_id_types_do_not_coerce() {
        // Compile-time guarantee only: BuildId and JobId are not comparable
        // to each other. This test just exercises both constructors.
        let b = BuildId::new(1);
        let j = JobId::new(1);
        assert_eq!(b.get(), j.get());
    }
}
