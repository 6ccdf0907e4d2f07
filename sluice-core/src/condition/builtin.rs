//! Built-in conditions.

use super::{Condition, Readiness, ReadinessView};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Ready when an input port holds at least `min_count` messages.
#[derive(Debug, Clone)]
pub struct MessageAvailable {
    port: String,
    min_count: usize,
}

impl MessageAvailable {
    /// Condition on `port` holding at least `min_count` messages.
    pub fn new(port: impl Into<String>, min_count: usize) -> Self {
        Self {
            port: port.into(),
            min_count: min_count.max(1),
        }
    }

    /// The watched port.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Condition for MessageAvailable {
    fn name(&self) -> &str {
        "message_available"
    }

    fn check(&self, view: &dyn ReadinessView) -> Readiness {
        match view.input_len(&self.port) {
            Some(len) if len >= self.min_count => Readiness::Ready,
            _ => Readiness::NotReady,
        }
    }
}

/// Ready when every queue fed by an output port has at least `min_size` free slots.
///
/// Unconnected outputs are always ready.
#[derive(Debug, Clone)]
pub struct DownstreamAffordable {
    port: String,
    min_size: usize,
}

impl DownstreamAffordable {
    /// Condition on the consumers of `port` having room for `min_size` messages.
    pub fn new(port: impl Into<String>, min_size: usize) -> Self {
        Self {
            port: port.into(),
            min_size: min_size.max(1),
        }
    }

    /// The watched port.
    pub fn port(&self) -> &str {
        &self.port
    }
}

impl Condition for DownstreamAffordable {
    fn name(&self) -> &str {
        "downstream_affordable"
    }

    fn check(&self, view: &dyn ReadinessView) -> Readiness {
        match view.downstream_room(&self.port) {
            None => Readiness::Ready,
            Some(room) if room >= self.min_size => Readiness::Ready,
            Some(_) => Readiness::NotReady,
        }
    }
}

/// Ready for the first `count` ticks, then never again.
#[derive(Debug, Clone, Copy)]
pub struct CountCondition {
    count: u64,
}

impl CountCondition {
    /// Allow exactly `count` ticks.
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

impl Condition for CountCondition {
    fn name(&self) -> &str {
        "count"
    }

    fn check(&self, view: &dyn ReadinessView) -> Readiness {
        if view.tick_count() < self.count {
            Readiness::Ready
        } else {
            Readiness::Never
        }
    }
}

/// A condition toggled from outside the operator.
///
/// Clones share the same flag, so a clone kept by the application (or by the
/// operator itself) can enable or disable ticking while the run is in
/// progress. Once every clone except the one attached to the operator has been
/// dropped, a disabled condition can never be re-enabled and reports
/// [`Readiness::Never`].
#[derive(Debug, Clone)]
pub struct BooleanCondition {
    enabled: Arc<AtomicBool>,
}

impl BooleanCondition {
    /// Create a condition with the given initial state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    /// Allow ticking.
    pub fn enable_tick(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop ticking.
    pub fn disable_tick(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    /// Whether ticking is currently allowed.
    pub fn check_tick_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }
}

impl Default for BooleanCondition {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Condition for BooleanCondition {
    fn name(&self) -> &str {
        "boolean"
    }

    fn check(&self, view: &dyn ReadinessView) -> Readiness {
        if view.shutdown_requested() {
            return Readiness::Never;
        }
        if self.check_tick_enabled() {
            Readiness::Ready
        } else if Arc::strong_count(&self.enabled) == 1 {
            Readiness::Never
        } else {
            Readiness::NotReady
        }
    }

    fn awaits_external(&self, view: &dyn ReadinessView) -> bool {
        !view.shutdown_requested() && Arc::strong_count(&self.enabled) > 1
    }
}

/// Ready at most once per `period`.
#[derive(Debug, Clone, Copy)]
pub struct PeriodicCondition {
    period: Duration,
}

impl PeriodicCondition {
    /// Tick no more often than every `period`.
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    /// The configured period.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Condition for PeriodicCondition {
    fn name(&self) -> &str {
        "periodic"
    }

    fn check(&self, view: &dyn ReadinessView) -> Readiness {
        let Some(last) = view.last_tick() else {
            return Readiness::Ready;
        };
        let next = last + self.period;
        if view.now() >= next {
            Readiness::Ready
        } else {
            Readiness::WaitUntil(next)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::test_view::FixedView;
    use std::time::Instant;

    #[test]
    fn message_available_counts_queue() {
        let mut view = FixedView::default();
        let cond = MessageAvailable::new("in", 2);
        assert_eq!(cond.check(&view), Readiness::NotReady);
        view.inputs.insert("in".into(), 1);
        assert_eq!(cond.check(&view), Readiness::NotReady);
        view.inputs.insert("in".into(), 2);
        assert_eq!(cond.check(&view), Readiness::Ready);
    }

    #[test]
    fn downstream_affordable_gates_on_room() {
        let mut view = FixedView::default();
        let cond = DownstreamAffordable::new("out", 1);
        assert_eq!(cond.check(&view), Readiness::Ready);
        view.room.insert("out".into(), 0);
        assert_eq!(cond.check(&view), Readiness::NotReady);
        view.room.insert("out".into(), 1);
        assert_eq!(cond.check(&view), Readiness::Ready);
    }

    #[test]
    fn count_becomes_never() {
        let mut view = FixedView::default();
        let cond = CountCondition::new(3);
        view.ticks = 2;
        assert_eq!(cond.check(&view), Readiness::Ready);
        view.ticks = 3;
        assert_eq!(cond.check(&view), Readiness::Never);
    }

    #[test]
    fn boolean_waits_while_handle_alive() {
        let view = FixedView::default();
        let cond = BooleanCondition::new(false);
        let handle = cond.clone();
        assert_eq!(cond.check(&view), Readiness::NotReady);
        assert!(cond.awaits_external(&view));
        handle.enable_tick();
        assert_eq!(cond.check(&view), Readiness::Ready);
        handle.disable_tick();
        drop(handle);
        assert_eq!(cond.check(&view), Readiness::Never);
        assert!(!cond.awaits_external(&view));
    }

    #[test]
    fn boolean_is_never_after_shutdown() {
        let mut view = FixedView::default();
        view.shutdown = true;
        assert_eq!(BooleanCondition::new(true).check(&view), Readiness::Never);
    }

    #[test]
    fn periodic_waits_for_next_slot() {
        let start = Instant::now();
        let mut view = FixedView {
            now: start,
            ..FixedView::default()
        };
        let cond = PeriodicCondition::new(Duration::from_millis(50));
        assert_eq!(cond.check(&view), Readiness::Ready);
        view.last = Some(start);
        assert_eq!(
            cond.check(&view),
            Readiness::WaitUntil(start + Duration::from_millis(50))
        );
        view.now = start + Duration::from_millis(60);
        assert_eq!(cond.check(&view), Readiness::Ready);
    }
}
