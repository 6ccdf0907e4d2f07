//! The operator contract.
//!
//! Operators are the units of work in a pipeline. Each one declares its ports,
//! parameters and conditions once in `setup`, then runs through a strictly
//! ordered lifecycle driven by the executor.

use crate::context::{ExecutionContext, InputContext, OutputContext};
use crate::error::{Result, SluiceError};
use crate::parameter::Parameters;
use crate::spec::OperatorSpec;
use std::fmt;

/// Lifecycle states of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed, nothing declared yet.
    Created,
    /// `setup` has run.
    Declared,
    /// Parameters are resolved and `initialize` succeeded.
    Initialized,
    /// `start` succeeded.
    Started,
    /// At least one tick has run.
    Running,
    /// `stop` has run.
    Stopped,
}

impl LifecycleState {
    /// Whether the transition `self -> next` is allowed.
    ///
    /// Transitions never skip a state; `Started` and `Running` may move to
    /// `Stopped`, and `Running` may repeat.
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Created, Declared)
                | (Declared, Initialized)
                | (Initialized, Started)
                | (Started, Running)
                | (Running, Running)
                | (Started, Stopped)
                | (Running, Stopped)
        )
    }

    /// Whether `start` has succeeded and `stop` has not yet run.
    pub fn is_started(self) -> bool {
        matches!(self, Self::Started | Self::Running)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Declared => "declared",
            Self::Initialized => "initialized",
            Self::Started => "started",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// The lifecycle hook an error was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// `setup`.
    Setup,
    /// `initialize`.
    Initialize,
    /// `start`.
    Start,
    /// `tick`.
    Tick,
    /// `stop`.
    Stop,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Setup => "setup",
            Self::Initialize => "initialize",
            Self::Start => "start",
            Self::Tick => "tick",
            Self::Stop => "stop",
        };
        f.write_str(s)
    }
}

/// A schedulable unit of streaming computation.
///
/// Only `setup` is required. The executor calls the hooks in the order
/// `setup, initialize, start, tick*, stop`, and calls `stop` exactly once for
/// every operator whose `start` succeeded, even when a later tick fails.
///
/// `tick` must return promptly: it consumes what is ready, emits at most the
/// declared capacity per output, and returns.
///
/// # Example
///
/// ```
/// use sluice_core::prelude::*;
///
/// struct Doubler;
///
/// impl Operator for Doubler {
///     fn setup(&mut self, spec: &mut OperatorSpec) {
///         spec.input::<i64>("in");
///         spec.output::<i64>("out");
///     }
///
///     fn tick(
///         &mut self,
///         input: &mut InputContext,
///         output: &mut OutputContext,
///         _ctx: &ExecutionContext,
///     ) -> Result<()> {
///         let value = input.receive::<i64>("in")?;
///         output.emit("out", *value * 2)
///     }
/// }
/// ```
pub trait Operator: Send + 'static {
    /// Declare ports, parameters and conditions. Called exactly once.
    fn setup(&mut self, spec: &mut OperatorSpec);

    /// Read resolved parameter values.
    fn initialize(&mut self, params: &Parameters) -> Result<()> {
        let _ = params;
        Ok(())
    }

    /// Acquire runtime resources before the first tick.
    fn start(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Run one bounded step of work.
    fn tick(
        &mut self,
        input: &mut InputContext,
        output: &mut OutputContext,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let _ = (input, output, ctx);
        Ok(())
    }

    /// Release what `start` acquired.
    fn stop(&mut self, ctx: &ExecutionContext) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Tracks an operator's lifecycle state and rejects out-of-order transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    operator: String,
    state: LifecycleState,
}

impl Lifecycle {
    /// Start tracking a newly created operator.
    pub fn new(operator: impl Into<String>) -> Self {
        Self {
            operator: operator.into(),
            state: LifecycleState::Created,
        }
    }

    /// The current state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Move to `next`, failing if the transition skips or reverses a state.
    pub fn advance(&mut self, next: LifecycleState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(SluiceError::InvalidTransition {
                operator: self.operator.clone(),
                from: self.state,
                to: next,
            });
        }
        tracing::trace!(operator = %self.operator, from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_are_strictly_ordered() {
        let mut lc = Lifecycle::new("op");
        lc.advance(LifecycleState::Declared).unwrap();
        assert!(lc.advance(LifecycleState::Started).is_err());
        lc.advance(LifecycleState::Initialized).unwrap();
        lc.advance(LifecycleState::Started).unwrap();
        lc.advance(LifecycleState::Running).unwrap();
        lc.advance(LifecycleState::Running).unwrap();
        lc.advance(LifecycleState::Stopped).unwrap();
        assert!(lc.advance(LifecycleState::Running).is_err());
    }

    #[test]
    fn started_operator_may_stop_without_ticking() {
        assert!(LifecycleState::Started.can_transition_to(LifecycleState::Stopped));
        assert!(!LifecycleState::Initialized.can_transition_to(LifecycleState::Stopped));
    }
}
