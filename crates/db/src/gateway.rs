//! Postgres implementation of [`DbGateway`], grounded 1:1 on
//! `atc/db/resource_cache_factory.go`'s `FindOrCreateResourceCache`,
//! `UpdateResourceCacheMetadata`, `ResourceCacheMetadata`, and
//! `FindResourceCacheByID`.
//!
//! The upsert shape is preserved verbatim: `SELECT ... FOR UPDATE` /
//! `FOR SHARE` followed by `INSERT ... ON CONFLICT ... DO UPDATE ...
//! RETURNING` on a miss, all inside one transaction, rather than a plain
//! `SELECT` + conditional `INSERT` (which would reopen the race the
//! original explicitly closes).

use std::collections::BTreeMap;

use async_trait::async_trait;
use forge_core::error::{CoreError, Result};
use forge_core::hash::md5_of_json;
use forge_core::id::{BaseResourceTypeId, ResourceCacheId, ResourceConfigId};
use forge_core::ports::DbGateway;
use forge_core::types::{CacheUser, MetadataField, ResourceCache, ResourceConfigParent};
use serde_json::Value;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::config::DbConfig;

pub struct PgGateway {
    pool: PgPool,
}

impl PgGateway {
    /// Open a connection pool from `config`. Does not ping the database;
    /// the first query surfaces any connectivity failure.
    pub async fn connect(config: &DbConfig) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.resolved_connection_string())
            .await?;
        Ok(Self { pool })
    }

    /// Wrap an already-open pool (tests, or a pool shared with other
    /// gateways in the same process).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_base_resource_type(tx: &mut Transaction<'_, Postgres>, name: &str) -> Result<BaseResourceTypeId> {
        let row = sqlx::query("SELECT id FROM base_resource_types WHERE name = $1").bind(name).fetch_optional(&mut **tx).await?;
        match row {
            Some(row) => Ok(BaseResourceTypeId::new(row.try_get("id")?)),
            None => Err(CoreError::BaseResourceTypeNotFound(name.to_string())),
        }
    }

    async fn find_or_create_resource_config(
        tx: &mut Transaction<'_, Postgres>,
        parent: ResourceConfigParent,
        source_hash: &str,
    ) -> Result<ResourceConfigId> {
        let (base_id, cache_id) = match parent {
            ResourceConfigParent::Base(id) => (Some(id.get()), None),
            ResourceConfigParent::Cache(id) => (None, Some(id.get())),
        };

        let existing = sqlx::query(
            "SELECT id FROM resource_configs \
             WHERE base_resource_type_id IS NOT DISTINCT FROM $1 \
               AND resource_cache_id IS NOT DISTINCT FROM $2 \
               AND source_hash = $3 \
             FOR UPDATE",
        )
        .bind(base_id)
        .bind(cache_id)
        .bind(source_hash)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = existing {
            return Ok(ResourceConfigId::new(row.try_get("id")?));
        }

        let row = sqlx::query(
            "INSERT INTO resource_configs (base_resource_type_id, resource_cache_id, source_hash) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (base_resource_type_id, resource_cache_id, source_hash) DO UPDATE SET \
               base_resource_type_id = EXCLUDED.base_resource_type_id, \
               resource_cache_id = EXCLUDED.resource_cache_id, \
               source_hash = EXCLUDED.source_hash \
             RETURNING id",
        )
        .bind(base_id)
        .bind(cache_id)
        .bind(source_hash)
        .fetch_one(&mut **tx)
        .await?;

        Ok(ResourceConfigId::new(row.try_get("id")?))
    }

    async fn find_or_create_resource_cache_row(
        tx: &mut Transaction<'_, Postgres>,
        resource_config_id: ResourceConfigId,
        version: &Value,
        params_hash: &str,
    ) -> Result<ResourceCacheId> {
        let cache_version = serde_json::to_string(version)?;
        let version_md5 = md5_of_json(version);

        let existing = sqlx::query(
            "SELECT id FROM resource_caches \
             WHERE resource_config_id = $1 AND params_hash = $2 AND version_md5 = $3 \
             FOR SHARE",
        )
        .bind(resource_config_id.get())
        .bind(params_hash)
        .bind(&version_md5)
        .fetch_optional(&mut **tx)
        .await?;

        if let Some(row) = existing {
            return Ok(ResourceCacheId::new(row.try_get("id")?));
        }

        let row = sqlx::query(
            "INSERT INTO resource_caches (resource_config_id, version, version_md5, params_hash) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (resource_config_id, version_md5, params_hash) DO UPDATE SET \
               resource_config_id = EXCLUDED.resource_config_id, \
               version = EXCLUDED.version, \
               version_md5 = EXCLUDED.version_md5, \
               params_hash = EXCLUDED.params_hash \
             RETURNING id",
        )
        .bind(resource_config_id.get())
        .bind(&cache_version)
        .bind(&version_md5)
        .bind(params_hash)
        .fetch_one(&mut **tx)
        .await?;

        Ok(ResourceCacheId::new(row.try_get("id")?))
    }

    async fn ensure_resource_cache_use(tx: &mut Transaction<'_, Postgres>, cache_id: ResourceCacheId, user: &CacheUser) -> Result<()> {
        let (build_id, container_handle, resource_id, resource_type_id): (Option<i64>, Option<&str>, Option<i64>, Option<i64>) = match user {
            CacheUser::Build(id) => (Some(id.get()), None, None, None),
            CacheUser::Container(handle) => (None, Some(handle.as_str()), None, None),
            CacheUser::Resource(id) => (None, None, Some(id.get()), None),
            CacheUser::ResourceType(id) => (None, None, None, Some(id.get())),
        };

        // Exactly one of the four columns is non-null per call, mirroring
        // `resourceCacheUser.SQLMap()`'s single-key map; `IS NOT DISTINCT
        // FROM` treats two NULLs as equal so the other three columns still
        // match the existing (also-NULL) row.
        let exists = sqlx::query(
            "SELECT 1 FROM resource_cache_uses \
             WHERE resource_cache_id = $1 \
               AND build_id IS NOT DISTINCT FROM $2 \
               AND container_handle IS NOT DISTINCT FROM $3 \
               AND resource_id IS NOT DISTINCT FROM $4 \
               AND resource_type_id IS NOT DISTINCT FROM $5",
        )
        .bind(cache_id.get())
        .bind(build_id)
        .bind(container_handle)
        .bind(resource_id)
        .bind(resource_type_id)
        .fetch_optional(&mut **tx)
        .await?;

        if exists.is_some() {
            return Ok(());
        }

        sqlx::query(
            "INSERT INTO resource_cache_uses (resource_cache_id, build_id, container_handle, resource_id, resource_type_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(cache_id.get())
        .bind(build_id)
        .bind(container_handle)
        .bind(resource_id)
        .bind(resource_type_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl DbGateway for PgGateway {
    async fn find_or_create_resource_cache(
        &self,
        user: CacheUser,
        resource_type_name: &str,
        version: Value,
        source: BTreeMap<String, String>,
        params: BTreeMap<String, String>,
        custom_type_cache: Option<ResourceCacheId>,
    ) -> Result<ResourceCache> {
        let mut tx = self.pool.begin().await?;

        let parent = match custom_type_cache {
            Some(cache_id) => ResourceConfigParent::Cache(cache_id),
            None => ResourceConfigParent::Base(Self::find_base_resource_type(&mut tx, resource_type_name).await?),
        };

        let source_hash = forge_core::types::map_hash(&source);
        let resource_config_id = Self::find_or_create_resource_config(&mut tx, parent, &source_hash).await?;

        let params_hash = forge_core::types::map_hash(&params);
        let cache_id = Self::find_or_create_resource_cache_row(&mut tx, resource_config_id, &version, &params_hash).await?;

        Self::ensure_resource_cache_use(&mut tx, cache_id, &user).await?;

        let version_md5 = md5_of_json(&version);
        tx.commit().await?;

        Ok(ResourceCache { id: cache_id, resource_config_id, version, version_md5, params_hash, metadata: None, parent_chain: Vec::new() })
    }

    async fn update_resource_cache_metadata(&self, id: ResourceCacheId, metadata: Vec<MetadataField>) -> Result<()> {
        let metadata_json = serde_json::to_value(&metadata)?;
        sqlx::query("UPDATE resource_caches SET metadata = $1 WHERE id = $2")
            .bind(metadata_json)
            .bind(id.get())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resource_cache_metadata(&self, id: ResourceCacheId) -> Result<Vec<MetadataField>> {
        let row = sqlx::query("SELECT metadata FROM resource_caches WHERE id = $1").bind(id.get()).fetch_optional(&self.pool).await?;
        let Some(row) = row else { return Ok(Vec::new()) };
        let metadata_json: Option<Value> = row.try_get("metadata")?;
        match metadata_json {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    async fn find_resource_cache_by_id(&self, id: ResourceCacheId) -> Result<Option<ResourceCache>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *tx).await?;

        let row = sqlx::query("SELECT resource_config_id, version, version_md5, params_hash, metadata FROM resource_caches WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let version: Value = row.try_get("version")?;
        let metadata_json: Option<Value> = row.try_get("metadata")?;
        let metadata = match metadata_json {
            Some(value) => Some(serde_json::from_value(value)?),
            None => None,
        };
        let resource_config_id = ResourceConfigId::new(row.try_get("resource_config_id")?);

        let parent_chain = Self::resolve_parent_chain(&mut tx, resource_config_id).await?;
        tx.rollback().await?;

        Ok(Some(ResourceCache {
            id,
            resource_config_id,
            version,
            version_md5: row.try_get("version_md5")?,
            params_hash: row.try_get("params_hash")?,
            metadata,
            parent_chain,
        }))
    }

    /// Walks `resource_configs.{base_resource_type_id,resource_cache_id}`
    /// from `config_id` up to its `Base` ancestor, crossing into the
    /// parent cache's own `resource_config_id` at each `Cache` link.
    /// Grounded on `FindResourceCacheByID`'s `findResourceConfigByID` walk
    /// (§4.1); terminates because config→cache→config insertion order is
    /// acyclic (§4 "Cyclic references").
    async fn resolve_parent_chain(tx: &mut Transaction<'_, Postgres>, config_id: ResourceConfigId) -> Result<Vec<ResourceConfigParent>> {
        let mut chain = Vec::new();
        let mut current = config_id;

        loop {
            let row = sqlx::query("SELECT base_resource_type_id, resource_cache_id FROM resource_configs WHERE id = $1")
                .bind(current.get())
                .fetch_one(&mut **tx)
                .await?;

            let base_id: Option<i64> = row.try_get("base_resource_type_id")?;
            let cache_id: Option<i64> = row.try_get("resource_cache_id")?;

            match (base_id, cache_id) {
                (Some(base_id), None) => {
                    chain.push(ResourceConfigParent::Base(BaseResourceTypeId::new(base_id)));
                    break;
                }
                (None, Some(cache_id)) => {
                    let cache_id = ResourceCacheId::new(cache_id);
                    chain.push(ResourceConfigParent::Cache(cache_id));

                    let parent_row = sqlx::query("SELECT resource_config_id FROM resource_caches WHERE id = $1")
                        .bind(cache_id.get())
                        .fetch_one(&mut **tx)
                        .await?;
                    current = ResourceConfigId::new(parent_row.try_get("resource_config_id")?);
                }
                _ => return Err(CoreError::BaseResourceTypeNotFound(format!("resource_config {current} has neither a base type nor a parent cache"))),
            }
        }

        Ok(chain)
    }
}
