//! # Forge GC
//!
//! Garbage collection sweepers for `resource_config_check_sessions` rows
//! (§4.4), each invoked on a fixed period by an external ticker owned by the
//! caller. Grounded on `atc/gc/resource_config_check_session_collector.go`'s
//! two-cleanup-calls-per-cycle shape.

pub mod error;
pub mod sweepers;

pub use error::SweepError;
pub use sweepers::{ExpiredCheckSessionSweeper, InactiveCheckSessionSweeper};
