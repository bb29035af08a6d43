//! # Forge Core
//!
//! Shared domain types, ids, content-hashing helpers, and collaborator
//! traits (ports) for the Forge CI control plane. Every other crate in this
//! workspace (`forge-db`, `forge-resource-cache`, `forge-worker-pool`,
//! `forge-scheduler`, `forge-gc`) depends on this one.
//!
//! ## Key components
//!
//! - **Ids**: [`id::BuildId`], [`id::ResourceCacheId`], [`id::ResourceConfigId`],
//!   [`id::JobId`], [`id::WorkerId`] — surrogate-integer newtypes.
//! - **Domain model**: [`types::ResourceConfig`], [`types::ResourceCache`],
//!   [`types::Build`], [`types::Worker`], [`types::VersionedResource`].
//! - **Content hashing**: [`hash::canonical_json`], [`hash::md5_hex`].
//! - **Ports**: [`ports::PipelineDb`], [`ports::BuildsDb`], [`ports::Scanner`],
//!   [`ports::BuildFactory`], [`ports::Engine`], [`ports::PlacementStrategy`].

pub mod error;
pub mod hash;
pub mod id;
pub mod ports;
pub mod types;

pub use error::{CoreError, Result};
pub use id::{BaseResourceTypeId, BuildId, CheckSessionId, JobId, ResourceCacheId, ResourceConfigId, ResourceId, WorkerId};

/// Common prelude for downstream crates.
pub mod prelude {
    pub use crate::error::{CoreError, Result};
    pub use crate::id::*;
    pub use crate::ports::*;
    pub use crate::types::*;
}
