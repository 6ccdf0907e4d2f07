//! Readiness conditions.
//!
//! An operator is eligible to tick when every condition attached to it
//! reports [`Readiness::Ready`]. Conditions are evaluated by the scheduler
//! against a [`ReadinessView`], a read-only snapshot of the operator's queues
//! and tick history; they never see the operator itself.

mod builtin;

pub use builtin::{
    BooleanCondition, CountCondition, DownstreamAffordable, MessageAvailable, PeriodicCondition,
};

use std::fmt::Debug;
use std::time::Instant;

/// The outcome of evaluating a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The operator may tick now.
    Ready,
    /// Not now; may become ready after other operators make progress.
    NotReady,
    /// Not now; will become ready at the given instant without outside progress.
    WaitUntil(Instant),
    /// Will never be ready again.
    Never,
}

impl Readiness {
    /// Combine two results as a conjunction.
    ///
    /// `Never` dominates, then `NotReady`. Two deadlines combine to the later
    /// one. `Ready` is the identity.
    #[must_use]
    pub fn and(self, other: Readiness) -> Readiness {
        use Readiness::*;
        match (self, other) {
            (Never, _) | (_, Never) => Never,
            (NotReady, _) | (_, NotReady) => NotReady,
            (WaitUntil(a), WaitUntil(b)) => WaitUntil(a.max(b)),
            (WaitUntil(a), Ready) | (Ready, WaitUntil(a)) => WaitUntil(a),
            (Ready, Ready) => Ready,
        }
    }

    /// Whether the operator may tick now.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Whether the operator is permanently finished.
    pub fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }
}

/// Read-only state a condition may inspect.
pub trait ReadinessView {
    /// Messages queued on an input port, or None if no such port exists.
    fn input_len(&self, port: &str) -> Option<usize>;

    /// Minimum free slots across the queues an output port feeds.
    ///
    /// Returns None if the port is unconnected or does not exist.
    fn downstream_room(&self, port: &str) -> Option<usize>;

    /// Number of completed ticks.
    fn tick_count(&self) -> u64;

    /// When the last tick started.
    fn last_tick(&self) -> Option<Instant>;

    /// The evaluation time.
    fn now(&self) -> Instant;

    /// Whether a stop has been requested for the run.
    fn shutdown_requested(&self) -> bool;
}

/// A predicate deciding whether an operator may tick.
pub trait Condition: Send + Sync + Debug {
    /// Short name for logging.
    fn name(&self) -> &str;

    /// Evaluate the condition.
    fn check(&self, view: &dyn ReadinessView) -> Readiness;

    /// Whether a NotReady result can turn Ready while no operator ticks.
    ///
    /// Conditions toggled from outside the run return true for as long as a
    /// toggle can still arrive. The scheduler keeps waiting on them instead
    /// of treating the run as drained.
    fn awaits_external(&self, view: &dyn ReadinessView) -> bool {
        let _ = view;
        false
    }
}

/// Evaluate a set of conditions as a conjunction.
///
/// An empty set is always ready.
pub fn evaluate(conditions: &[Box<dyn Condition>], view: &dyn ReadinessView) -> Readiness {
    let mut readiness = Readiness::Ready;
    for condition in conditions {
        readiness = readiness.and(condition.check(view));
        if readiness.is_never() {
            break;
        }
    }
    readiness
}

/// Whether a NotReady conjunction is blocked only by external conditions.
///
/// False when any NotReady member depends on run state (queues, tick
/// counts), since that state cannot move while nothing ticks.
pub fn awaits_external(conditions: &[Box<dyn Condition>], view: &dyn ReadinessView) -> bool {
    let mut blocked = false;
    for condition in conditions {
        if condition.check(view) == Readiness::NotReady {
            if !condition.awaits_external(view) {
                return false;
            }
            blocked = true;
        }
    }
    blocked
}
