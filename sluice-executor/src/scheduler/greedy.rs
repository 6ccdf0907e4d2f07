//! Single-threaded greedy scheduling.
//!
//! Operators are scanned in declaration order. A ready operator is ticked on
//! the scheduler's own task and its outputs are delivered before the next
//! operator is evaluated, so downstream operators later in the same scan see
//! them immediately.

use super::config::ExecutorConfig;
use super::pass::{PassState, idle, should_stop};
use super::plan::ExecutionPlan;
use super::summary::{RoutingFailure, Termination};
use sluice_core::error::Result;
use sluice_core::condition::Readiness;
use std::time::Instant;

pub(crate) async fn run(
    plan: &mut ExecutionPlan,
    config: &ExecutorConfig,
    deadline: Option<Instant>,
    failures: &mut Vec<RoutingFailure>,
) -> Result<Termination> {
    let shutdown = plan.shutdown.clone();
    loop {
        if let Some(termination) = should_stop(&shutdown, deadline) {
            return Ok(termination);
        }

        let mut pass = PassState::default();
        for index in 0..plan.len() {
            let now = Instant::now();
            match plan.readiness(index, now) {
                Readiness::Ready => {
                    let job = plan.begin_tick(index)?;
                    let outcome = job.run();
                    let (result, emitted) = plan.finish_tick(outcome);
                    result.map_err(|e| super::executor::lifecycle_error(
                        sluice_core::operator::LifecyclePhase::Tick,
                        &plan.units[index].name,
                        e,
                    ))?;
                    plan.deliver(index, emitted, failures);
                    pass.ticked();
                }
                Readiness::NotReady if plan.awaits_external(index, now) => pass.awaiting_external(),
                other => pass.observe(other),
            }
        }

        if pass.ticked {
            tokio::task::yield_now().await;
            continue;
        }
        if let Some(termination) = idle(&pass, config, &shutdown, deadline).await {
            return Ok(termination);
        }
    }
}
