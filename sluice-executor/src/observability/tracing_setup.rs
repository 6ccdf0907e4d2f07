//! Subscriber installation.

use super::config::{LogFormat, TracingConfig};
use anyhow::{Context, Result};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Keeps the subscriber installed for as long as it is held.
#[derive(Debug)]
#[must_use = "dropping the guard immediately is almost never intended"]
pub struct TracingGuard {
    _private: (),
}

/// Install a global subscriber for `config`.
///
/// Fails if the filter directives are invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: TracingConfig) -> Result<TracingGuard> {
    let filter = EnvFilter::try_new(config.log_filter())
        .with_context(|| format!("Invalid log filter '{}'", config.log_filter()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format() {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target())
                    .with_thread_ids(config.include_thread_ids())
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target())
                    .with_thread_ids(config.include_thread_ids()),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_file(config.include_location())
                    .with_line_number(config.include_location())
                    .with_target(config.include_target())
                    .with_thread_ids(config.include_thread_ids()),
            )
            .try_init(),
    };
    result.context("Failed to initialize tracing subscriber")?;

    Ok(TracingGuard { _private: () })
}
