//! Run lifecycle.
//!
//! The executor drives one [`ExecutionPlan`] through the operator lifecycle:
//!
//! 1. Resolve parameters and call `initialize` on every operator
//! 2. Call `start` in dependency order
//! 3. Run the scheduling loop of the configured policy
//! 4. Call `stop` on every started operator, in reverse start order
//!
//! Step 4 runs on every path once any `start` succeeded, including start
//! failures of later operators and tick failures.

use super::config::{ExecutorConfig, SchedulerPolicy};
use super::plan::ExecutionPlan;
use super::summary::RunSummary;
use super::{greedy, parallel};
use crate::operator_span;
use sluice_core::error::{Result, SluiceError};
use sluice_core::operator::{LifecyclePhase, LifecycleState};
use sluice_core::parameter::Parameters;
use sluice_core::registry::Registry;
use std::time::Instant;
use tracing::instrument;

/// Wrap an error raised inside a lifecycle hook.
///
/// Parameter errors and already wrapped errors pass through unchanged.
pub(crate) fn lifecycle_error(phase: LifecyclePhase, operator: &str, error: SluiceError) -> SluiceError {
    match error {
        e if e.is_parameter_error() => e,
        e @ SluiceError::OperatorLifecycle { .. } => e,
        SluiceError::Operator { message } => SluiceError::OperatorLifecycle {
            phase,
            operator: operator.to_string(),
            cause: message,
        },
        other => SluiceError::OperatorLifecycle {
            phase,
            operator: operator.to_string(),
            cause: other.to_string(),
        },
    }
}

/// Drives operators through their lifecycle and schedules their ticks.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor.
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    /// The executor configuration.
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run a plan to termination.
    ///
    /// Returns the first fatal error after every started operator has been
    /// stopped.
    #[instrument(skip_all, fields(run_id = %plan.run_id(), operators = plan.len(), policy = ?self.config.policy))]
    pub async fn run(&self, plan: &mut ExecutionPlan, registry: &Registry) -> Result<RunSummary> {
        tracing::info!("Run starting");
        self.initialize(plan, registry)?;

        let started = self.start(plan)?;

        let interrupt = self.config.handle_interrupt.then(|| {
            let shutdown = plan.shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupt received, requesting shutdown");
                    shutdown.request();
                }
            })
        });

        let begin = Instant::now();
        let deadline = self.config.max_duration.map(|d| begin + d);
        let mut failures = Vec::new();
        let outcome = match self.config.policy {
            SchedulerPolicy::Greedy => greedy::run(plan, &self.config, deadline, &mut failures).await,
            SchedulerPolicy::MultiThread => {
                parallel::run(plan, &self.config, deadline, &mut failures).await
            }
        };
        let elapsed = begin.elapsed();

        if let Some(handle) = interrupt {
            handle.abort();
        }

        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Scheduling stopped on error");
        }
        let stopped = self.stop(plan, &started);

        let termination = outcome?;
        stopped?;

        let summary = RunSummary {
            run_id: plan.run_id(),
            termination,
            ticks: plan.tick_counts(),
            routing_failures: failures,
            elapsed,
        };
        tracing::info!(
            termination = %summary.termination,
            ticks = summary.total_ticks(),
            routing_failures = summary.routing_failures.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Run finished"
        );
        Ok(summary)
    }

    /// Resolve parameters and initialize every operator.
    ///
    /// Every operator is attempted so that all failures are logged; the first
    /// one is returned.
    fn initialize(&self, plan: &mut ExecutionPlan, registry: &Registry) -> Result<()> {
        let run_id = plan.run_id();
        let mut first_error = None;
        for unit in plan.units.iter_mut() {
            let _span = operator_span!(run_id, unit.name, LifecyclePhase::Initialize).entered();
            let result = Parameters::resolve(
                &unit.name,
                unit.spec.params(),
                &unit.explicit_args,
                &unit.configured_args,
                registry,
            )
            .and_then(|params| match unit.operator.as_mut() {
                Some(op) => op.initialize(&params),
                None => Ok(()),
            })
            .and_then(|()| unit.lifecycle.advance(LifecycleState::Initialized))
            .map_err(|e| lifecycle_error(LifecyclePhase::Initialize, &unit.name, e));

            match result {
                Ok(()) => tracing::debug!("Operator initialized"),
                Err(e) => {
                    tracing::error!(error = %e, "Initialization failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Start operators in dependency order, returning their indices.
    ///
    /// On failure the operators already started are stopped in reverse order
    /// before the error is returned.
    fn start(&self, plan: &mut ExecutionPlan) -> Result<Vec<usize>> {
        let run_id = plan.run_id();
        let order = plan.start_order.clone();
        let mut started = Vec::with_capacity(order.len());
        for index in order {
            let unit = &mut plan.units[index];
            let span = operator_span!(run_id, unit.name, LifecyclePhase::Start).entered();
            let result = match unit.operator.as_mut() {
                Some(op) => op.start(&unit.ctx),
                None => Ok(()),
            }
            .and_then(|()| unit.lifecycle.advance(LifecycleState::Started));

            match result {
                Ok(()) => {
                    tracing::debug!("Operator started");
                    started.push(index);
                }
                Err(e) => {
                    let error = lifecycle_error(LifecyclePhase::Start, &unit.name, e);
                    tracing::error!(error = %error, "Start failed");
                    drop(span);
                    // Stop errors on this path are logged only; the start failure wins.
                    let _ = self.stop(plan, &started);
                    return Err(error);
                }
            }
        }
        Ok(started)
    }

    /// Stop the given operators in reverse order. Every one is attempted; the
    /// first failure is returned.
    fn stop(&self, plan: &mut ExecutionPlan, started: &[usize]) -> Result<()> {
        let run_id = plan.run_id();
        let mut first_error = None;
        for &index in started.iter().rev() {
            let unit = &mut plan.units[index];
            if !unit.lifecycle.state().is_started() {
                continue;
            }
            let _span = operator_span!(run_id, unit.name, LifecyclePhase::Stop).entered();
            let result = match unit.operator.as_mut() {
                Some(op) => op.stop(&unit.ctx.with_tick_count(unit.ticks)),
                None => {
                    tracing::warn!("Operator was lost during a tick, cannot stop it");
                    Ok(())
                }
            };
            // The operator is considered stopped even if its stop hook failed.
            let _ = unit.lifecycle.advance(LifecycleState::Stopped);
            match result {
                Ok(()) => tracing::debug!("Operator stopped"),
                Err(e) => {
                    let error = lifecycle_error(LifecyclePhase::Stop, &unit.name, e);
                    tracing::error!(error = %error, "Stop failed");
                    first_error.get_or_insert(error);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
