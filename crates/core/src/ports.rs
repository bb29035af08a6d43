//! Capability interfaces for the collaborators the control plane consumes
//! but does not implement (§6, §9 "Fakes / dynamic dispatch").
//!
//! Every trait here is consumed as `&dyn Trait` / `Arc<dyn Trait>`, never as
//! a concrete type, mirroring how `scheduler_test.go`'s fakes
//! (`fakedb.FakePipeline`, `fakeengine.FakeEngine`, `fakeBuildFactory`, ...)
//! substitute for Go interfaces. Tests substitute hand-written recording
//! fakes; no runtime monkey-patching is needed.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::id::{BuildId, JobId, ResourceCacheId, WorkerId};
use crate::types::{Build, BuildInputs, CacheUser, Job, MetadataField, PlacementSpec, ResourceCache, VersionedResource, Worker};

/// The engine-level execution graph materialised from `(job, resources,
/// inputs)`. Opaque to everything except the `Engine`/`BuildFactory`
/// implementation; the control plane only ever moves it around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub build_id: BuildId,
    /// Opaque plan document, produced and consumed entirely by external
    /// collaborators.
    pub document: Value,
}

/// Read access to jobs, resources, and their latest known versions.
///
/// Grounded on the `PipelineDB`/`BuildsDB` split named in §9: this trait
/// covers the read side (`PipelineDB` in the original), `BuildsDb` below
/// covers the write/mutate side.
#[async_trait]
pub trait PipelineDb: Send + Sync {
    /// Latest known version for a named resource, if any has been scanned.
    async fn latest_version(&self, resource_name: &str) -> Result<Option<VersionedResource>>;

    /// The job definition, including its configured inputs and scheduling
    /// constraints.
    async fn job(&self, job_id: JobId) -> Result<Job>;
}

/// Build lifecycle operations: create, look up, schedule, error, and find
/// by input signature.
#[async_trait]
pub trait BuildsDb: Send + Sync {
    /// `GetJobBuildForInputs` — find an existing build for this exact
    /// `(job, inputs)` signature, if one exists.
    async fn job_build_for_inputs(&self, job_id: JobId, inputs: &BuildInputs) -> Result<Option<Build>>;

    /// `CreateJobBuildWithInputs` — create a new build recording these
    /// inputs up front.
    async fn create_job_build_with_inputs(&self, job_id: JobId, inputs: BuildInputs) -> Result<Build>;

    /// `CreateJobBuild` — create a new build with no inputs recorded yet
    /// (used by `TriggerImmediately`).
    async fn create_job_build(&self, job_id: JobId) -> Result<Build>;

    /// The next pending build for this job, if any.
    async fn next_pending_build(&self, job_id: JobId) -> Result<Option<Build>>;

    /// Atomically decide whether this build may be scheduled now, honouring
    /// the job's `serial`/`max_in_flight` constraints. A single boolean
    /// contract on the DB, per §4.3.
    async fn schedule_build(&self, build_id: BuildId, job_id: JobId) -> Result<bool>;

    /// Mark a build errored with a human-readable reason. Commits.
    async fn error_build(&self, build_id: BuildId, reason: &str) -> Result<()>;

    /// Mark a build started. Commits.
    async fn start_build(&self, build_id: BuildId) -> Result<()>;
}

/// `Scanner.Scan(ctx, resource_name) → error`. Idempotent; advances the
/// latest known versions for that resource. May block for arbitrarily long
/// (remote I/O).
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, resource_name: &str) -> Result<()>;
}

/// `Build Factory.Create(job, resources, inputs) → Plan | error`. Pure
/// function over its inputs.
#[async_trait]
pub trait BuildFactory: Send + Sync {
    async fn create(&self, job: &Job, inputs: &BuildInputs) -> Result<Plan>;
}

/// A build handed off to the engine; `resume` is fire-and-forget (§4.3
/// "shared handoff", §9 "immediate resume").
#[async_trait]
pub trait EngineBuild: Send + Sync {
    async fn resume(&self);
}

/// `Engine.CreateBuild(build, plan) → EngineBuild | error`.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn create_build(&self, build: &Build, plan: &Plan) -> Result<Box<dyn EngineBuild>>;
}

/// `Placement Strategy.Choose(pool, candidates, containerSpec) → Worker |
/// error`. Strategies are pluggable; the worker pool itself is
/// strategy-agnostic.
#[async_trait]
pub trait PlacementStrategy: Send + Sync {
    async fn choose(&self, candidates: &[Worker], container_spec: &PlacementSpec) -> Result<Worker>;
}

/// Read access to which workers currently host a container owned by a
/// given owner handle (`FindWorkersForContainerByOwner` in the original).
#[async_trait]
pub trait WorkerLocality: Send + Sync {
    async fn workers_with_container(&self, owner: &str) -> Result<Vec<Worker>>;
}

/// Enumerate and look up registered workers.
#[async_trait]
pub trait WorkerDb: Send + Sync {
    async fn workers(&self) -> Result<Vec<Worker>>;
    async fn worker_by_name(&self, name: &str) -> Result<Option<Worker>>;
}

/// Team-scoped worker lookups for an already-placed volume/container
/// (`Team.FindWorkerForVolume`/`FindWorkerForContainer` in the original).
#[async_trait]
pub trait TeamWorkerLookup: Send + Sync {
    async fn find_worker_for_volume(&self, team_id: i64, handle: &str) -> Result<Option<Worker>>;
    async fn find_worker_for_container(&self, team_id: i64, handle: &str) -> Result<Option<Worker>>;
}

/// Resource-cache-specific reads/writes the resolver needs beyond the
/// transactional upsert it performs itself via [`crate::ports::DbGateway`] —
/// kept separate so the resolver's own crate can depend on a narrower
/// surface in tests.
#[async_trait]
pub trait ResourceCacheLookup: Send + Sync {
    async fn by_id(&self, id: ResourceCacheId) -> Result<Option<crate::types::ResourceCache>>;
}

/// Transactional access to the resource cache resolver's tables
/// (`resource_configs`, `resource_caches`, `resource_cache_uses`),
/// implemented by `forge-db`'s `PgGateway`. Kept as a trait in `core` so
/// `forge-resource-cache` can depend on it without depending on `sqlx`
/// directly (`scheduler_test.go`'s fake-collaborator pattern, §9).
#[async_trait]
pub trait DbGateway: Send + Sync {
    /// `FindOrCreateResourceCache` — resolves (creating if necessary) the
    /// `resource_configs` row, the `resource_caches` row, and the
    /// `resource_cache_uses` association, all inside one transaction.
    /// `custom_type_cache` is `Some` when the resource's type is itself a
    /// custom resource (parented to another cache) rather than a base
    /// resource type.
    #[allow(clippy::too_many_arguments)]
    async fn find_or_create_resource_cache(
        &self,
        user: CacheUser,
        resource_type_name: &str,
        version: Value,
        source: BTreeMap<String, String>,
        params: BTreeMap<String, String>,
        custom_type_cache: Option<ResourceCacheId>,
    ) -> Result<ResourceCache>;

    async fn update_resource_cache_metadata(&self, id: ResourceCacheId, metadata: Vec<MetadataField>) -> Result<()>;

    /// Empty, not an error, when the `metadata` column is null (never set).
    async fn resource_cache_metadata(&self, id: ResourceCacheId) -> Result<Vec<MetadataField>>;

    async fn find_resource_cache_by_id(&self, id: ResourceCacheId) -> Result<Option<ResourceCache>>;
}

/// Row-level access to `resource_config_check_sessions` for the GC
/// sweepers (§4.4). Deletion is per-row rather than a bulk statement so a
/// sweeper can defer a row currently locked by a concurrent resolver write
/// instead of blocking on it.
#[async_trait]
pub trait CheckSessionGateway: Send + Sync {
    /// Ids of sessions whose `expires_at` has passed.
    async fn expired_check_session_ids(&self) -> Result<Vec<crate::id::CheckSessionId>>;

    /// Ids of sessions whose owning resource is no longer active in any
    /// pipeline.
    async fn inactive_check_session_ids(&self) -> Result<Vec<crate::id::CheckSessionId>>;

    /// Attempt to delete one row under a row lock. `Ok(false)` means the
    /// row is currently locked by a concurrent writer (e.g. the resource
    /// cache resolver inserting a use) and was left alone this cycle — not
    /// an error.
    async fn try_delete_check_session(&self, id: crate::id::CheckSessionId) -> Result<bool>;
}

/// A lease to a worker, returned by `FindWorker` in the original (unused
/// directly by the control plane; included so downstream consumers can
/// reference the worker's id without re-deriving it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerHandle(pub WorkerId);
