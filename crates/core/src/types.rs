//! Plain-data domain model (§3 of the specification).

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::{md5_hex, md5_of_json};
use crate::id::{BaseResourceTypeId, BuildId, JobId, ResourceCacheId, ResourceConfigId, WorkerId};

/// Which kind of entity a [`ResourceConfig`] is parented to. Modelled as a
/// tagged union rather than two nullable columns at the Rust layer — the
/// Postgres gateway is responsible for flattening this to
/// `base_resource_type_id` / `resource_cache_id` columns, exactly one of
/// which is populated per row (see `SUPPLEMENTED FEATURES` in
/// `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceConfigParent {
    /// Parented to a built-in resource type.
    Base(BaseResourceTypeId),
    /// Parented to another resource cache (custom resource types).
    Cache(ResourceCacheId),
}

/// A `resource_configs` row: identity is `(parent, source_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub id: ResourceConfigId,
    pub parent: ResourceConfigParent,
    pub source_hash: String,
    pub last_referenced: DateTime<Utc>,
}

/// A `resource_caches` row: identity is
/// `(resource_config_id, version_md5, params_hash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCache {
    pub id: ResourceCacheId,
    pub resource_config_id: ResourceConfigId,
    /// Opaque version document, as originally supplied.
    pub version: Value,
    pub version_md5: String,
    pub params_hash: String,
    /// Opaque, mutable metadata. `None` means "never set".
    pub metadata: Option<Vec<MetadataField>>,
    /// The resolved ancestry of `resource_config_id`, nearest parent first,
    /// ending in a `Base` link (§4.1 "resolves its parent chain
    /// recursively"). Empty unless the lookup that produced this value
    /// walked the chain — `FindOrCreate` doesn't need it and leaves it
    /// empty; `FindResourceCacheByID` always populates it.
    pub parent_chain: Vec<ResourceConfigParent>,
}

/// One field of a resource cache's metadata (arbitrary name/value pair
/// surfaced by the resource type plugin, e.g. a commit message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataField {
    pub name: String,
    pub value: String,
}

/// Exactly one non-null user reference for a `resource_cache_uses` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheUser {
    Build(BuildId),
    Container(String),
    Resource(crate::id::ResourceId),
    ResourceType(BaseResourceTypeId),
}

/// A `resource_cache_uses` association row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCacheUse {
    pub resource_cache_id: ResourceCacheId,
    pub user: CacheUser,
}

/// The status of a build, as tracked by the scheduler (§3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Started,
    Succeeded,
    Failed,
    Errored,
    Aborted,
}

impl BuildStatus {
    /// `true` once a build can no longer change status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Errored | Self::Aborted
        )
    }
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Errored => "errored",
            Self::Aborted => "aborted",
        };
        write!(f, "{s}")
    }
}

/// `(resource_name, type, version map, source map)` — an observed version
/// of a resource. `version`/`source` are unordered string maps, compared by
/// canonical encoding (`core::hash`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedResource {
    pub resource_name: String,
    pub resource_type: String,
    pub version: BTreeMap<String, String>,
    pub source: BTreeMap<String, String>,
}

impl VersionedResource {
    /// Content hash of the `version` map only, matching `version_md5` in
    /// the resource cache resolver.
    #[must_use]
    pub fn version_md5(&self) -> String {
        let value = serde_json::to_value(&self.version).expect("BTreeMap<String,String> is always valid JSON");
        md5_of_json(&value)
    }
}

/// A build's recorded input: `name → VersionedResource`.
pub type BuildInputs = BTreeMap<String, VersionedResource>;

/// Configured input for a job, as defined in pipeline config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInputConfig {
    pub name: String,
    pub resource: String,
    pub params: BTreeMap<String, String>,
    pub trigger: bool,
}

/// The trigger-filtered view of a [`JobInputConfig`] used when deciding
/// whether a version change should start a new build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub name: String,
    pub resource: String,
}

impl JobInput {
    /// Build the trigger-filtered view from a job's configured inputs.
    #[must_use]
    pub fn trigger_inputs(configs: &[JobInputConfig]) -> Vec<Self> {
        configs
            .iter()
            .filter(|c| c.trigger)
            .map(|c| Self {
                name: c.name.clone(),
                resource: c.resource.clone(),
            })
            .collect()
    }
}

/// A build, as tracked by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub name: String,
    pub status: BuildStatus,
    pub job: JobId,
    pub inputs: BuildInputs,
}

/// Job scheduling constraints consulted by `ScheduleBuild`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConstraints {
    /// At most one build of this job may be scheduled at a time.
    pub serial: bool,
    /// At most `max_in_flight` builds of this job may run concurrently
    /// (`0` means unlimited).
    pub max_in_flight: u32,
}

/// A job definition: id, name, configured inputs, and scheduling
/// constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub inputs: Vec<JobInputConfig>,
    pub constraints: JobConstraints,
}

/// A registered worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    /// Raw semantic version string (e.g. `"2.4.0"`), parsed lazily by the
    /// worker pool; `None` means "no version reported".
    pub version: Option<String>,
    pub platform: String,
    pub tags: HashSet<String>,
    /// `0` means "general pool", not scoped to any team.
    pub team_id: i64,
    pub resource_types: HashSet<String>,
}

/// A worker placement request (`Spec` in the specification).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementSpec {
    pub platform: Option<String>,
    pub resource_type: Option<String>,
    pub tags: Vec<String>,
    pub team_id: i64,
}

/// Source-hash / params-hash helper, identical treatment for both (MD5 of
/// the canonical JSON encoding of a sorted string map).
#[must_use]
pub fn map_hash(map: &BTreeMap<String, String>) -> String {
    let value = serde_json::to_value(map).expect("BTreeMap<String,String> is always valid JSON");
    md5_of_json(&value)
}

/// MD5 of an opaque container/volume handle, used nowhere directly but
/// exposed for symmetry with `map_hash`/`version_md5` call sites that want
/// a stable short key for logging.
#[must_use]
pub fn handle_hash(handle: &str) -> String {
    md5_hex(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_status_terminal() {
        assert!(BuildStatus::Succeeded.is_terminal());
        assert!(BuildStatus::Errored.is_terminal());
        assert!(!BuildStatus::Pending.is_terminal());
        assert!(!BuildStatus::Started.is_terminal());
    }

    #[test]
    fn trigger_inputs_filters_non_triggering() {
        let configs = vec![
            JobInputConfig {
                name: "a".into(),
                resource: "repo-a".into(),
                params: BTreeMap::new(),
                trigger: true,
            },
            JobInputConfig {
                name: "b".into(),
                resource: "repo-b".into(),
                params: BTreeMap::new(),
                trigger: false,
            },
        ];
        let triggers = JobInput::trigger_inputs(&configs);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].name, "a");
    }

    #[test]
    fn map_hash_is_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("ref".to_string(), "deadbeef".to_string());
        let mut b = BTreeMap::new();
        b.insert("ref".to_string(), "deadbeef".to_string());
        assert_eq!(map_hash(&a), map_hash(&b));
    }

    #[test]
    fn versioned_resource_version_md5_is_deterministic() {
        let mut version = BTreeMap::new();
        version.insert("ref".to_string(), "abc".to_string());
        let vr = VersionedResource {
            resource_name: "repo".into(),
            resource_type: "git".into(),
            version,
            source: BTreeMap::new(),
        };
        assert_eq!(vr.version_md5(), vr.version_md5());
    }

    #[test]
    fn build_status_display() {
        assert_eq!(BuildStatus::Pending.to_string(), "pending");
        assert_eq!(BuildStatus::Errored.to_string(), "errored");
    }
}
