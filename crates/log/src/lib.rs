//! # Forge Log
//!
//! Structured logging init for the Forge control plane, built directly on
//! `tracing` + `tracing-subscriber`. A process embedding this workspace
//! calls [`init`] once at startup; every other crate here only ever logs
//! through the plain `tracing` macros and has no dependency on this one.
//!
//! This crate intentionally does not carry a `Context`/builder/reload/otel
//! surface — see `DESIGN.md` for why that part of the lineage was trimmed.

pub mod format;
pub mod macros;

// Re-exported so `$crate::error!` works from within `log_error!` without
// every call site also depending on `tracing` directly.
pub use tracing::{debug, error, info, trace, warn};

use std::time::Instant;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format for the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, ANSI-coloured when stdout is a tty.
    #[default]
    Pretty,
    /// One JSON object per line, for log shipping.
    Json,
}

/// Logging configuration, read from the environment at process start.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Overrides `RUST_LOG` if set; otherwise `RUST_LOG` (default `info`)
    /// is used.
    pub filter: Option<String>,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: None,
            format: LogFormat::Pretty,
        }
    }
}

/// Install the process-wide `tracing` subscriber. Safe to call at most
/// once; a second call is a programmer error and panics, matching
/// `tracing_subscriber::util::SubscriberInitExt::init`'s own behaviour.
pub fn init(config: &LogConfig) {
    let filter = config
        .filter
        .clone()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}

/// RAII timer used by [`timed!`](crate::timed): logs the elapsed time when
/// dropped.
pub struct TimerGuard {
    name: &'static str,
    start: Instant,
}

impl TimerGuard {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name, start: Instant::now() }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        tracing::debug!(name = self.name, elapsed_ms = self.start.elapsed().as_millis(), "timed block completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_pretty() {
        let config = LogConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.filter.is_none());
    }
}
