//! # Forge Worker Pool
//!
//! The worker placement pool (§4.2), grounded 1:1 on `atc/worker2/pool.go`.
//! Strategy-agnostic: placement decisions beyond "locality wins" are
//! delegated to an injected [`PlacementStrategy`].

pub mod version;

use std::sync::Arc;

use forge_core::error::{CoreError, Result};
use forge_core::ports::{PlacementStrategy, TeamWorkerLookup, WorkerDb, WorkerLocality};
use forge_core::types::{PlacementSpec, Worker};
use version::ReleaseVersion;

pub struct Pool {
    db: Arc<dyn WorkerDb>,
    locality: Arc<dyn WorkerLocality>,
    team_lookup: Arc<dyn TeamWorkerLookup>,
    /// The pool's target worker version; workers are checked against this
    /// by [`version::is_compatible`].
    worker_version: ReleaseVersion,
}

impl Pool {
    #[must_use]
    pub fn new(db: Arc<dyn WorkerDb>, locality: Arc<dyn WorkerLocality>, team_lookup: Arc<dyn TeamWorkerLookup>, worker_version: ReleaseVersion) -> Self {
        Self { db, locality, team_lookup, worker_version }
    }

    /// `FindOrSelectWorker` — locality wins outright; otherwise the
    /// strategy chooses among all compatible workers.
    pub async fn find_or_select_worker(&self, owner: &str, container_spec: &PlacementSpec, worker_spec: &PlacementSpec, strategy: &dyn PlacementStrategy) -> Result<Worker> {
        let (worker, compatible) = self.find_worker_for_container(owner, worker_spec).await?;
        match worker {
            Some(worker) => Ok(worker),
            None => strategy.choose(&compatible, container_spec).await,
        }
    }

    /// `FindWorkerForContainer` — locality lookup alone, no strategy
    /// fallback.
    pub async fn find_worker_for_container_only(&self, owner: &str, worker_spec: &PlacementSpec) -> Result<Option<Worker>> {
        Ok(self.find_worker_for_container(owner, worker_spec).await?.0)
    }

    async fn find_worker_for_container(&self, owner: &str, worker_spec: &PlacementSpec) -> Result<(Option<Worker>, Vec<Worker>)> {
        let workers_with_container = self.locality.workers_with_container(owner).await?;
        let compatible = self.all_compatible(worker_spec).await?;

        let locality_match = workers_with_container.iter().find(|w| compatible.iter().any(|c| c.name == w.name)).cloned();

        Ok((locality_match, compatible))
    }

    /// `FindWorker` — direct lookup by name, version-compatibility
    /// enforced.
    pub async fn find_worker(&self, name: &str) -> Result<Option<Worker>> {
        let Some(worker) = self.db.worker_by_name(name).await? else { return Ok(None) };
        Ok(self.is_worker_version_compatible(&worker).then_some(worker))
    }

    /// `LocateVolume` — team-scoped lookup, version-compatibility enforced.
    pub async fn locate_volume(&self, team_id: i64, handle: &str) -> Result<Option<Worker>> {
        let Some(worker) = self.team_lookup.find_worker_for_volume(team_id, handle).await? else { return Ok(None) };
        Ok(self.is_worker_version_compatible(&worker).then_some(worker))
    }

    /// `LocateContainer` — team-scoped lookup, version-compatibility
    /// enforced.
    pub async fn locate_container(&self, team_id: i64, handle: &str) -> Result<Option<Worker>> {
        let Some(worker) = self.team_lookup.find_worker_for_container(team_id, handle).await? else { return Ok(None) };
        Ok(self.is_worker_version_compatible(&worker).then_some(worker))
    }

    /// `allCompatible` — team-scoped compatible workers win over general
    /// ones; no fallback from a non-empty-but-rejected team set (§9 Open
    /// Question, preserved as specified).
    pub async fn all_compatible(&self, spec: &PlacementSpec) -> Result<Vec<Worker>> {
        let workers = self.db.workers().await?;
        if workers.is_empty() {
            return Err(CoreError::NoWorkers);
        }

        let (team_workers, general_workers): (Vec<_>, Vec<_>) = workers.into_iter().filter(|w| self.is_worker_compatible(w, spec)).partition(|w| w.team_id != 0);

        if !team_workers.is_empty() {
            return Ok(team_workers);
        }
        if !general_workers.is_empty() {
            return Ok(general_workers);
        }
        Err(CoreError::NoCompatibleWorkers)
    }

    fn is_worker_version_compatible(&self, worker: &Worker) -> bool {
        let Some(raw) = &worker.version else {
            tracing::info!(worker = %worker.name, "empty worker version");
            return false;
        };
        let Some(worker_version) = ReleaseVersion::parse(raw) else {
            tracing::warn!(worker = %worker.name, version = %raw, "failed to parse worker version");
            return false;
        };
        version::is_compatible(&worker_version, &self.worker_version)
    }

    fn is_worker_compatible(&self, worker: &Worker, spec: &PlacementSpec) -> bool {
        if !self.is_worker_version_compatible(worker) {
            return false;
        }
        if worker.team_id != 0 && spec.team_id != worker.team_id {
            return false;
        }
        if let Some(resource_type) = &spec.resource_type {
            if !worker.resource_types.contains(resource_type) {
                return false;
            }
        }
        if let Some(platform) = &spec.platform {
            if platform != &worker.platform {
                return false;
            }
        }
        tags_match(worker, &spec.tags)
    }
}

/// If the worker advertises any tags at all, the spec must request at
/// least one, and every requested tag must be present on the worker.
fn tags_match(worker: &Worker, tags: &[String]) -> bool {
    if !worker.tags.is_empty() && tags.is_empty() {
        return false;
    }
    tags.iter().all(|tag| worker.tags.contains(tag))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use forge_core::id::WorkerId;
    use rstest::rstest;

    use super::*;

    fn worker(name: &str, version: &str, team_id: i64, platform: &str, tags: &[&str], resource_types: &[&str]) -> Worker {
        Worker {
            id: WorkerId::new(1),
            name: name.to_string(),
            version: Some(version.to_string()),
            platform: platform.to_string(),
            tags: tags.iter().map(|t| (*t).to_string()).collect(),
            team_id,
            resource_types: resource_types.iter().map(|t| (*t).to_string()).collect(),
        }
    }

    fn default_pool() -> Pool {
        struct Unused;
        #[async_trait::async_trait]
        impl WorkerDb for Unused {
            async fn workers(&self) -> Result<Vec<Worker>> {
                Ok(Vec::new())
            }
            async fn worker_by_name(&self, _name: &str) -> Result<Option<Worker>> {
                Ok(None)
            }
        }
        #[async_trait::async_trait]
        impl WorkerLocality for Unused {
            async fn workers_with_container(&self, _owner: &str) -> Result<Vec<Worker>> {
                Ok(Vec::new())
            }
        }
        #[async_trait::async_trait]
        impl TeamWorkerLookup for Unused {
            async fn find_worker_for_volume(&self, _team_id: i64, _handle: &str) -> Result<Option<Worker>> {
                Ok(None)
            }
            async fn find_worker_for_container(&self, _team_id: i64, _handle: &str) -> Result<Option<Worker>> {
                Ok(None)
            }
        }
        Pool::new(Arc::new(Unused), Arc::new(Unused), Arc::new(Unused), ReleaseVersion::parse("2.4.0").unwrap())
    }

    #[rstest]
    #[case::exact_match(&["linux"], "linux", true)]
    #[case::mismatch(&["linux"], "darwin", false)]
    fn platform_matching(#[case] worker_platform: &[&str], #[case] spec_platform: &str, #[case] expect_compatible: bool) {
        let pool = default_pool();
        let w = worker("w1", "2.4.0", 0, worker_platform[0], &[], &[]);
        let spec = PlacementSpec { platform: Some(spec_platform.to_string()), ..PlacementSpec::default() };
        assert_eq!(pool.is_worker_compatible(&w, &spec), expect_compatible);
    }

    #[test]
    fn tags_require_subset_match() {
        let tagged = worker("tagged", "2.4.0", 0, "linux", &["gpu"], &[]);
        assert!(!tags_match(&tagged, &[]));
        assert!(tags_match(&tagged, &["gpu".to_string()]));

        let untagged = worker("plain", "2.4.0", 0, "linux", &[], &[]);
        assert!(tags_match(&untagged, &[]));
    }

    #[test]
    fn team_scoped_worker_requires_matching_team() {
        let pool = default_pool();
        let w = worker("w1", "2.4.0", 7, "linux", &[], &[]);
        let mismatched = PlacementSpec { team_id: 9, ..PlacementSpec::default() };
        let matched = PlacementSpec { team_id: 7, ..PlacementSpec::default() };
        assert!(!pool.is_worker_compatible(&w, &mismatched));
        assert!(pool.is_worker_compatible(&w, &matched));
    }

    #[test]
    fn resource_type_must_be_advertised() {
        let pool = default_pool();
        let w = worker("w1", "2.4.0", 0, "linux", &[], &["git"]);
        let spec = PlacementSpec { resource_type: Some("docker-image".to_string()), ..PlacementSpec::default() };
        assert!(!pool.is_worker_compatible(&w, &spec));
    }

    #[tokio::test]
    async fn all_compatible_errors_when_no_workers_registered() {
        let pool = default_pool();
        let err = pool.all_compatible(&PlacementSpec::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::NoWorkers));
    }
}
