//! # Forge Resource Cache
//!
//! The resource cache resolver (§4.1): content-addressed artifact lookup
//! keyed by `(parent, source, version, params)`, wrapping a
//! `forge_core::ports::DbGateway` with the retry/circuit-breaker policy
//! from `forge-resilience`.

use std::collections::BTreeMap;
use std::sync::Arc;

use forge_core::error::CoreError;
use forge_core::id::ResourceCacheId;
use forge_core::ports::DbGateway;
use forge_core::types::{CacheUser, MetadataField, ResourceCache};
use forge_resilience::{CircuitBreaker, ResultExt, retry};
use serde_json::Value;

/// Thin error wrapper so this crate's public API doesn't leak
/// `forge-resilience`'s internal error type directly.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("resolver unavailable: {0}")]
    Unavailable(#[from] forge_resilience::ResilienceError),
}

pub type Result<T> = std::result::Result<T, ResolverError>;

/// The resolver service: `DbGateway` plus resilience wrapping. Cheap to
/// clone (`Arc` internally); constructed once per process.
#[derive(Clone)]
pub struct ResourceCacheResolver {
    gateway: Arc<dyn DbGateway>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry_config: forge_resilience::RetryConfig,
}

impl ResourceCacheResolver {
    #[must_use]
    pub fn new(gateway: Arc<dyn DbGateway>, circuit_breaker: Arc<CircuitBreaker>, retry_config: forge_resilience::RetryConfig) -> Self {
        Self { gateway, circuit_breaker, retry_config }
    }

    /// `FindOrCreate` — resolves (creating if necessary) the resource
    /// config, resource cache, and cache-use rows for `(user, type, source,
    /// version, params)`. Idempotent and safe to retry (§4.1 "Failure
    /// semantics").
    #[allow(clippy::too_many_arguments)]
    pub async fn find_or_create(
        &self,
        user: CacheUser,
        resource_type_name: &str,
        version: Value,
        source: BTreeMap<String, String>,
        params: BTreeMap<String, String>,
        custom_type_cache: Option<ResourceCacheId>,
    ) -> Result<ResourceCache> {
        let gateway = Arc::clone(&self.gateway);
        let retry_config = self.retry_config.clone();

        let result = self
            .circuit_breaker
            .execute(|| async {
                retry(&retry_config, |err| err.is_transient(), || {
                    let gateway = Arc::clone(&gateway);
                    let user = user.clone();
                    let version = version.clone();
                    let source = source.clone();
                    let params = params.clone();
                    async move {
                        gateway
                            .find_or_create_resource_cache(user, resource_type_name, version, source, params, custom_type_cache)
                            .await
                            .into_resilience()
                    }
                })
                .await
            })
            .await;

        result.map_err(ResolverError::from_resilience)
    }

    /// `UpdateResourceCacheMetadata` — replaces the cache's metadata with
    /// the given field list.
    pub async fn update_metadata(&self, id: ResourceCacheId, metadata: Vec<MetadataField>) -> Result<()> {
        self.gateway.update_resource_cache_metadata(id, metadata).await.map_err(ResolverError::from)
    }

    /// `ResourceCacheMetadata` — empty, not an error, when the cache has
    /// never had metadata set.
    pub async fn metadata(&self, id: ResourceCacheId) -> Result<Vec<MetadataField>> {
        self.gateway.resource_cache_metadata(id).await.map_err(ResolverError::from)
    }

    /// `FindResourceCacheByID`.
    pub async fn find_by_id(&self, id: ResourceCacheId) -> Result<Option<ResourceCache>> {
        self.gateway.find_resource_cache_by_id(id).await.map_err(ResolverError::from)
    }
}

impl ResolverError {
    fn from_resilience(err: forge_resilience::ResilienceError) -> Self {
        Self::Unavailable(err)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use forge_core::error::Result as CoreResult;
    use forge_core::id::ResourceConfigId;
    use forge_resilience::{CircuitBreakerConfig, RetryConfig};

    use super::*;

    struct FakeGateway {
        cache: ResourceCache,
    }

    #[async_trait]
    impl DbGateway for FakeGateway {
        async fn find_or_create_resource_cache(
            &self,
            _user: CacheUser,
            _resource_type_name: &str,
            _version: Value,
            _source: BTreeMap<String, String>,
            _params: BTreeMap<String, String>,
            _custom_type_cache: Option<ResourceCacheId>,
        ) -> CoreResult<ResourceCache> {
            Ok(self.cache.clone())
        }

        async fn update_resource_cache_metadata(&self, _id: ResourceCacheId, _metadata: Vec<MetadataField>) -> CoreResult<()> {
            Ok(())
        }

        async fn resource_cache_metadata(&self, _id: ResourceCacheId) -> CoreResult<Vec<MetadataField>> {
            Ok(Vec::new())
        }

        async fn find_resource_cache_by_id(&self, _id: ResourceCacheId) -> CoreResult<Option<ResourceCache>> {
            Ok(Some(self.cache.clone()))
        }
    }

    fn resolver(cache: ResourceCache) -> ResourceCacheResolver {
        ResourceCacheResolver::new(
            Arc::new(FakeGateway { cache }),
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default())),
            RetryConfig::default(),
        )
    }

    fn sample_cache() -> ResourceCache {
        ResourceCache {
            id: ResourceCacheId::new(1),
            resource_config_id: ResourceConfigId::new(1),
            version: serde_json::json!({"ref": "abc"}),
            version_md5: "deadbeef".into(),
            params_hash: "cafebabe".into(),
            metadata: None,
            parent_chain: Vec::new(),
        }
    }

    #[tokio::test]
    async fn find_or_create_returns_the_gateway_result() {
        let resolver = resolver(sample_cache());
        let cache = resolver
            .find_or_create(CacheUser::Build(forge_core::id::BuildId::new(1)), "git", serde_json::json!({"ref": "abc"}), BTreeMap::new(), BTreeMap::new(), None)
            .await
            .unwrap();
        assert_eq!(cache.id, ResourceCacheId::new(1));
    }

    #[tokio::test]
    async fn find_by_id_round_trips() {
        let resolver = resolver(sample_cache());
        let found = resolver.find_by_id(ResourceCacheId::new(1)).await.unwrap();
        assert!(found.is_some());
    }
}
