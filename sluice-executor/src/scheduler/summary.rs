//! Run results.

use sluice_core::error::SluiceError;
use sluice_core::types::RunId;
use std::fmt;
use std::time::Duration;

/// Why the scheduling loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Nothing was ready, no timer was pending and nothing was left to wait for.
    Drained,
    /// A stop was requested through the shutdown handle, an operator or Ctrl-C.
    ShutdownRequested,
    /// The configured wall-clock budget ran out.
    MaxDuration,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drained => f.write_str("drained"),
            Self::ShutdownRequested => f.write_str("shutdown_requested"),
            Self::MaxDuration => f.write_str("max_duration"),
        }
    }
}

/// An edge whose routing was disabled after a delivery failed.
#[derive(Debug)]
pub struct RoutingFailure {
    /// The edge, as "producer.port -> consumer.port".
    pub edge: String,
    /// The failure.
    pub error: SluiceError,
}

/// The outcome of a successful run.
#[derive(Debug)]
pub struct RunSummary {
    /// Identifier of the run.
    pub run_id: RunId,
    /// Why scheduling stopped.
    pub termination: Termination,
    /// Completed ticks per operator, in declaration order.
    pub ticks: Vec<(String, u64)>,
    /// Deliveries that failed and disabled their edge.
    pub routing_failures: Vec<RoutingFailure>,
    /// Time spent in the scheduling loop.
    pub elapsed: Duration,
}

impl RunSummary {
    /// Ticks of the named operator.
    pub fn ticks_of(&self, operator: &str) -> Option<u64> {
        self.ticks
            .iter()
            .find(|(name, _)| name == operator)
            .map(|(_, n)| *n)
    }

    /// Total ticks over all operators.
    pub fn total_ticks(&self) -> u64 {
        self.ticks.iter().map(|(_, n)| n).sum()
    }
}
