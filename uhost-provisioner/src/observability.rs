//! Logging setup and span helpers.
//!
//! The library only emits `tracing` events; binaries embedding the step
//! call [`init_tracing`] once at startup.

use anyhow::Context;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human readable multi-line output.
    #[default]
    Pretty,
}

/// Installs the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. Fails if a global
/// subscriber is already installed or the filter does not parse.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .with_context(|| format!("invalid log filter {default_filter:?}"))?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    installed.context("failed to install tracing subscriber")
}

/// Span wrapping one pass of the instance lifecycle.
#[must_use]
pub fn lifecycle_span(run_id: Uuid, path: &'static str) -> Span {
    tracing::info_span!("instance_lifecycle", %run_id, path)
}
