//! Scheduling and execution.
//!
//! - [`ExecutionPlan`] - queues, routes and conditions lowered from a graph
//! - [`Executor`] - lifecycle driver for one plan
//! - [`ExecutorConfig`] - policy selection and greedy-scheduler parameters
//! - [`RunSummary`] - what a finished run reports

mod config;
mod executor;
mod greedy;
mod parallel;
mod pass;
mod plan;
mod summary;

pub use config::{ExecutorConfig, SchedulerPolicy};
pub use executor::Executor;
pub use plan::{ExecutionPlan, PlanOperator, ReturnedOperator, Seed};
pub use summary::{RoutingFailure, RunSummary, Termination};
