//! Parallel scheduling.
//!
//! Each pass evaluates every operator against the same queue state, ticks
//! the whole ready set on the blocking pool (at most `worker_threads` at a
//! time), and only then delivers the produced messages, in declaration order
//! of the producers. Readiness is re-evaluated only after all deliveries of a
//! pass have landed, so the message order seen by any consumer does not
//! depend on thread timing.

use super::config::ExecutorConfig;
use super::executor::lifecycle_error;
use super::pass::{PassState, idle, should_stop};
use super::plan::{ExecutionPlan, TickOutcome};
use super::summary::{RoutingFailure, Termination};
use sluice_core::condition::Readiness;
use sluice_core::error::{Result, SluiceError};
use sluice_core::operator::LifecyclePhase;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Run the parallel loop until termination or the first tick error.
///
/// Panics inside a tick are caught on the worker and surface as tick errors.
/// A task that is lost anyway (its blocking thread cancelled or aborted)
/// takes its operator with it: the run fails with "tick task failed" and
/// that operator is skipped by the stop sweep, since there is nothing left
/// to call `stop` on.
pub(crate) async fn run(
    plan: &mut ExecutionPlan,
    config: &ExecutorConfig,
    deadline: Option<Instant>,
    failures: &mut Vec<RoutingFailure>,
) -> Result<Termination> {
    let shutdown = plan.shutdown.clone();
    let permits = Arc::new(Semaphore::new(config.worker_threads.max(1)));

    loop {
        if let Some(termination) = should_stop(&shutdown, deadline) {
            return Ok(termination);
        }

        let now = Instant::now();
        let mut pass = PassState::default();
        let mut ready = Vec::new();
        for index in 0..plan.len() {
            match plan.readiness(index, now) {
                Readiness::Ready => ready.push(index),
                Readiness::NotReady if plan.awaits_external(index, now) => pass.awaiting_external(),
                other => pass.observe(other),
            }
        }

        if ready.is_empty() {
            if let Some(termination) = idle(&pass, config, &shutdown, deadline).await {
                return Ok(termination);
            }
            continue;
        }

        tracing::trace!(ready = ready.len(), "Ticking ready set");
        let mut tasks = JoinSet::new();
        for &index in &ready {
            let permit = Arc::clone(&permits)
                .acquire_owned()
                .await
                .map_err(|e| SluiceError::operator(format!("worker pool closed: {}", e)))?;
            let job = plan.begin_tick(index)?;
            tasks.spawn_blocking(move || {
                let _permit = permit;
                job.run()
            });
        }

        let mut outcomes: Vec<TickOutcome> = Vec::with_capacity(ready.len());
        let mut lost = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    tracing::error!(error = %e, "Tick task was lost");
                    lost.get_or_insert_with(|| e.to_string());
                }
            }
        }
        outcomes.sort_by_key(|o| o.index);

        let finished: Vec<_> = outcomes
            .into_iter()
            .map(|outcome| {
                let index = outcome.index;
                let (result, emitted) = plan.finish_tick(outcome);
                (index, result, emitted)
            })
            .collect();

        let mut first_error = None;
        for (index, result, emitted) in finished {
            pass.ticked();
            if first_error.is_some() {
                continue;
            }
            match result {
                Ok(()) => plan.deliver(index, emitted, failures),
                Err(e) => {
                    first_error = Some(lifecycle_error(LifecyclePhase::Tick, &plan.units[index].name, e));
                }
            }
        }
        if let Some(error) = first_error {
            return Err(error);
        }
        if let Some(cause) = lost {
            // The lost operator stays detached; stop cannot reach it.
            return Err(SluiceError::operator(format!("tick task failed: {}", cause)));
        }
    }
}
