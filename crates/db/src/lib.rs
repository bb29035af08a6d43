//! # Forge DB
//!
//! Postgres gateway for the resource cache resolver, implementing
//! `forge_core::ports::DbGateway`. Every method runs inside a single
//! transaction with the row-lock discipline (`FOR UPDATE` / `FOR SHARE`)
//! and `ON CONFLICT ... DO UPDATE ... RETURNING` upsert shape of
//! `atc/db/resource_cache_factory.go`.

pub mod config;
pub mod gateway;

pub use config::DbConfig;
pub use gateway::PgGateway;
