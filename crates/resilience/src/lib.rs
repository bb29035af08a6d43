//! # Forge Resilience
//!
//! Retry and circuit-breaker wrapping for the DB Gateway boundary
//! (`forge-db`). This crate intentionally does not carry the rest of a
//! general-purpose resilience toolkit (bulkheads, rate limiters, hedging,
//! dynamic config, observability hooks) — see `DESIGN.md` for why that
//! surface was trimmed down to the two patterns the control plane actually
//! needs.

pub mod core;
pub mod patterns;
pub mod retry;

pub use core::{ErrorClass, ResilienceError, ResilienceResult, ResultExt, Retryable};
pub use patterns::{CircuitBreaker, CircuitBreakerConfig, State};
pub use retry::{RetryConfig, retry};
