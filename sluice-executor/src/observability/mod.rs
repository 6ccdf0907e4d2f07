//! Logging setup for sluice applications.
//!
//! The core and executor emit `tracing` events; this module installs a
//! subscriber for them. The output format is selected with
//! `SLUICE_LOG_FORMAT`:
//! - `json` - one JSON object per event
//! - `pretty` - multi-line human-readable output
//! - `compact` - single-line output (default)
//!
//! # Example
//!
//! ```no_run
//! use sluice_executor::observability::{LogFormat, TracingConfig, init_tracing};
//!
//! # fn main() -> anyhow::Result<()> {
//! let _guard = init_tracing(
//!     TracingConfig::builder()
//!         .log_format(LogFormat::Json)
//!         .log_filter("info,sluice_executor=debug")
//!         .build(),
//! )?;
//! # Ok(())
//! # }
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::{TracingGuard, init_tracing};

/// Open a span covering one lifecycle phase of one operator.
#[macro_export]
macro_rules! operator_span {
    ($run_id:expr, $operator:expr, $phase:expr) => {
        tracing::debug_span!(
            "operator",
            run_id = %$run_id,
            operator = %$operator,
            phase = %$phase
        )
    };
}
