//! Sluice Executor - graph composition and scheduling.
//!
//! This crate turns operators from `sluice-core` into a running pipeline:
//! - [`fragment::Fragment`] - the composition root: operators, flows,
//!   configuration and resources
//! - [`graph`] - the flow graph and its validation
//! - [`scheduler`] - greedy and multi-threaded schedulers and the lifecycle
//!   driver
//! - [`observability`] - tracing subscriber setup
//! - [`testing`] - small operators for tests and examples

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fragment;
pub mod graph;
pub mod observability;
pub mod scheduler;
pub mod testing;

pub use fragment::{Fragment, OperatorBuilder, OperatorHandle};
pub use scheduler::{Executor, ExecutorConfig, RunSummary, SchedulerPolicy, Termination};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::fragment::{Fragment, OperatorBuilder, OperatorHandle};
    pub use crate::graph::{Edge, FlowGraph, GraphNode};
    pub use crate::observability::{LogFormat, TracingConfig, init_tracing};
    pub use crate::scheduler::{
        Executor, ExecutorConfig, RoutingFailure, RunSummary, SchedulerPolicy, Termination,
    };
    pub use sluice_core::prelude::*;
}
