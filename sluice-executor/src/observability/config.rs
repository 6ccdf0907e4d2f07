//! Logging configuration.

use serde::Deserialize;
use sluice_core::config::Config;
use std::env;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line human-readable output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// Configuration for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    log_format: LogFormat,
    /// Filter directives (e.g., "info", "warn,sluice_executor=trace").
    log_filter: String,
    include_location: bool,
    include_target: bool,
    include_thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            log_filter: "info".to_string(),
            include_location: false,
            include_target: true,
            include_thread_ids: false,
        }
    }
}

impl TracingConfig {
    /// Create a new builder.
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder::default()
    }

    /// Create configuration from environment variables.
    ///
    /// - `SLUICE_LOG_FORMAT`: "json", "pretty" or "compact"
    /// - `SLUICE_LOG_LEVEL` or `RUST_LOG`: filter directives
    /// - `SLUICE_LOG_LOCATION`: "true" to include file and line
    /// - `SLUICE_LOG_THREAD_IDS`: "true" to include thread IDs
    pub fn from_env() -> Self {
        let log_format = env::var("SLUICE_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse::<LogFormat>().ok())
            .unwrap_or_default();

        let log_filter = env::var("SLUICE_LOG_LEVEL")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());

        Self {
            log_format,
            log_filter,
            include_location: env_flag("SLUICE_LOG_LOCATION"),
            include_target: true,
            include_thread_ids: env_flag("SLUICE_LOG_THREAD_IDS"),
        }
    }

    /// Read the `logging:` section of a configuration, on top of [`from_env`](Self::from_env).
    ///
    /// ```yaml
    /// logging:
    ///   format: json
    ///   filter: "info,sluice_executor=debug"
    ///   location: true
    ///   thread_ids: false
    /// ```
    pub fn from_config(config: &Config) -> sluice_core::Result<Self> {
        let base = Self::from_env();
        let Some(section) = config.section::<LoggingSection>("logging")? else {
            return Ok(base);
        };
        Ok(Self {
            log_format: section
                .format
                .map_or(base.log_format, |f| f.parse().unwrap_or_default()),
            log_filter: section.filter.unwrap_or(base.log_filter),
            include_location: section.location.unwrap_or(base.include_location),
            include_target: base.include_target,
            include_thread_ids: section.thread_ids.unwrap_or(base.include_thread_ids),
        })
    }

    /// The output format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The filter directives.
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Whether file and line are included.
    pub fn include_location(&self) -> bool {
        self.include_location
    }

    /// Whether the event target is included.
    pub fn include_target(&self) -> bool {
        self.include_target
    }

    /// Whether thread IDs are included.
    pub fn include_thread_ids(&self) -> bool {
        self.include_thread_ids
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LoggingSection {
    format: Option<String>,
    filter: Option<String>,
    location: Option<bool>,
    thread_ids: Option<bool>,
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|s| s.eq_ignore_ascii_case("true") || s == "1")
        .unwrap_or(false)
}

/// Builder for [`TracingConfig`].
#[derive(Debug, Clone, Default)]
pub struct TracingConfigBuilder {
    log_format: Option<LogFormat>,
    log_filter: Option<String>,
    include_location: Option<bool>,
    include_target: Option<bool>,
    include_thread_ids: Option<bool>,
}

impl TracingConfigBuilder {
    /// Set the output format.
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = Some(format);
        self
    }

    /// Set the filter directives.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Include file and line.
    pub fn include_location(mut self, include: bool) -> Self {
        self.include_location = Some(include);
        self
    }

    /// Include the event target.
    pub fn include_target(mut self, include: bool) -> Self {
        self.include_target = Some(include);
        self
    }

    /// Include thread IDs.
    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.include_thread_ids = Some(include);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TracingConfig {
        let defaults = TracingConfig::default();
        TracingConfig {
            log_format: self.log_format.unwrap_or(defaults.log_format),
            log_filter: self.log_filter.unwrap_or(defaults.log_filter),
            include_location: self.include_location.unwrap_or(defaults.include_location),
            include_target: self.include_target.unwrap_or(defaults.include_target),
            include_thread_ids: self
                .include_thread_ids
                .unwrap_or(defaults.include_thread_ids),
        }
    }
}
