//! Executor configuration.

use serde::Deserialize;
use sluice_core::config::Config;
use sluice_core::error::{Result, SluiceError};
use std::str::FromStr;
use std::time::Duration;

/// How ready operators are ticked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPolicy {
    /// One thread; operators are scanned in declaration order and each tick's
    /// outputs are delivered before the next operator is considered.
    #[default]
    Greedy,
    /// The whole ready set of a pass is ticked concurrently on the blocking
    /// pool; deliveries are applied afterwards in declaration order.
    #[serde(alias = "parallel", alias = "multithread")]
    MultiThread,
}

impl FromStr for SchedulerPolicy {
    type Err = SluiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "greedy" => Ok(Self::Greedy),
            "multi_thread" | "multithread" | "parallel" => Ok(Self::MultiThread),
            other => Err(SluiceError::config(format!("unknown scheduler '{}'", other))),
        }
    }
}

/// Configuration for the executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Scheduling policy.
    pub policy: SchedulerPolicy,
    /// Maximum operators ticked at once under [`SchedulerPolicy::MultiThread`].
    pub worker_threads: usize,
    /// Stop as soon as nothing is ready and no timer is pending.
    ///
    /// When false, the scheduler keeps polling every
    /// `check_recession_period` for external toggles until every operator
    /// reports Never or a stop is requested.
    pub stop_on_deadlock: bool,
    /// Wall-clock budget for the scheduling loop.
    pub max_duration: Option<Duration>,
    /// Poll interval while waiting for external toggles.
    pub check_recession_period: Duration,
    /// Input queues are never smaller than this.
    pub default_queue_capacity: usize,
    /// Request a graceful stop on Ctrl-C.
    pub handle_interrupt: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            policy: SchedulerPolicy::default(),
            worker_threads: default_worker_threads(),
            stop_on_deadlock: true,
            max_duration: None,
            check_recession_period: Duration::from_millis(5),
            default_queue_capacity: 1,
            handle_interrupt: false,
        }
    }
}

fn default_worker_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SchedulerSection {
    policy: Option<SchedulerPolicy>,
    worker_threads: Option<usize>,
    stop_on_deadlock: Option<bool>,
    max_duration_ms: Option<u64>,
    check_recession_period_ms: Option<u64>,
    default_queue_capacity: Option<usize>,
    handle_interrupt: Option<bool>,
}

impl ExecutorConfig {
    /// Create configuration from environment variables.
    ///
    /// - `SLUICE_SCHEDULER`: "greedy" or "multi_thread"
    /// - `SLUICE_WORKER_THREADS`: worker count for the parallel policy
    /// - `SLUICE_MAX_DURATION_MS`: wall-clock budget in milliseconds
    /// - `SLUICE_STOP_ON_DEADLOCK`: "false" to keep polling when idle
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let policy = std::env::var("SLUICE_SCHEDULER")
            .ok()
            .and_then(|s| s.parse::<SchedulerPolicy>().ok())
            .unwrap_or(defaults.policy);

        let worker_threads = std::env::var("SLUICE_WORKER_THREADS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.worker_threads);

        let max_duration = std::env::var("SLUICE_MAX_DURATION_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .or(defaults.max_duration);

        let stop_on_deadlock = std::env::var("SLUICE_STOP_ON_DEADLOCK")
            .ok()
            .map(|s| !(s.eq_ignore_ascii_case("false") || s == "0"))
            .unwrap_or(defaults.stop_on_deadlock);

        Self {
            policy,
            worker_threads,
            stop_on_deadlock,
            max_duration,
            ..defaults
        }
    }

    /// Read the `scheduler:` section of a configuration, on top of the defaults.
    ///
    /// ```yaml
    /// scheduler:
    ///   policy: multi_thread
    ///   worker_threads: 4
    ///   stop_on_deadlock: true
    ///   max_duration_ms: 5000
    ///   check_recession_period_ms: 10
    /// ```
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut result = Self::default();
        let Some(section) = config.section::<SchedulerSection>("scheduler")? else {
            return Ok(result);
        };
        if let Some(policy) = section.policy {
            result.policy = policy;
        }
        if let Some(n) = section.worker_threads {
            result.worker_threads = n.max(1);
        }
        if let Some(stop) = section.stop_on_deadlock {
            result.stop_on_deadlock = stop;
        }
        if let Some(ms) = section.max_duration_ms {
            result.max_duration = Some(Duration::from_millis(ms));
        }
        if let Some(ms) = section.check_recession_period_ms {
            result.check_recession_period = Duration::from_millis(ms);
        }
        if let Some(n) = section.default_queue_capacity {
            result.default_queue_capacity = n.max(1);
        }
        if let Some(flag) = section.handle_interrupt {
            result.handle_interrupt = flag;
        }
        Ok(result)
    }

    /// Set the scheduling policy.
    pub fn with_policy(mut self, policy: SchedulerPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the worker count.
    pub fn with_worker_threads(mut self, n: usize) -> Self {
        self.worker_threads = n.max(1);
        self
    }

    /// Set stop-on-deadlock.
    pub fn with_stop_on_deadlock(mut self, stop: bool) -> Self {
        self.stop_on_deadlock = stop;
        self
    }

    /// Set the wall-clock budget.
    pub fn with_max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }

    /// Set the idle poll interval.
    pub fn with_check_recession_period(mut self, period: Duration) -> Self {
        self.check_recession_period = period;
        self
    }

    /// Set the minimum input queue capacity.
    pub fn with_default_queue_capacity(mut self, capacity: usize) -> Self {
        self.default_queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable Ctrl-C handling.
    pub fn with_handle_interrupt(mut self, enabled: bool) -> Self {
        self.handle_interrupt = enabled;
        self
    }
}
