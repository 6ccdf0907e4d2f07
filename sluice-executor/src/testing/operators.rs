use parking_lot::Mutex;
use sluice_core::condition::CountCondition;
use sluice_core::context::{ExecutionContext, InputContext, OutputContext};
use sluice_core::error::{Result, SluiceError};
use sluice_core::operator::{LifecyclePhase, Operator};
use sluice_core::parameter::Parameters;
use sluice_core::spec::OperatorSpec;
use std::marker::PhantomData;
use std::sync::Arc;

/// Values collected by a [`RecordingSink`], readable after the run.
#[derive(Debug)]
pub struct SharedLog<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> Clone for SharedLog<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SharedLog<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T: Clone> SharedLog<T> {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value.
    pub fn push(&self, value: T) {
        self.inner.lock().push(value);
    }

    /// Snapshot of everything recorded so far.
    pub fn values(&self) -> Vec<T> {
        self.inner.lock().clone()
    }

    /// Number of values recorded.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// Lifecycle events recorded by [`LifecycleProbe`], as `"label:phase"`.
pub type EventLog = SharedLog<String>;

/// Emits `start, start + 1, ...` on `out`, one value per tick, `count` times.
///
/// `start` is a parameter defaulting to 1.
#[derive(Debug)]
pub struct CountingSource {
    count: u64,
    next: i64,
}

impl CountingSource {
    /// A source that ticks `count` times.
    pub fn new(count: u64) -> Self {
        Self { count, next: 1 }
    }
}

impl Operator for CountingSource {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.output::<i64>("out");
        spec.param::<i64>("start", "first value emitted").default(1);
        spec.condition(CountCondition::new(self.count));
    }

    fn initialize(&mut self, params: &Parameters) -> Result<()> {
        self.next = params.get("start")?;
        Ok(())
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let value = self.next;
        self.next += 1;
        output.emit("out", value)
    }
}

/// Records every value received on `in`.
pub struct RecordingSink<T> {
    log: SharedLog<T>,
}

impl<T: Clone + Send + Sync + 'static> RecordingSink<T> {
    /// A sink and the log it writes to.
    pub fn new() -> (Self, SharedLog<T>) {
        let log = SharedLog::new();
        (Self { log: log.clone() }, log)
    }
}

impl<T: Clone + Send + Sync + 'static> Operator for RecordingSink<T> {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.input::<T>("in");
    }

    fn tick(
        &mut self,
        input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let value = input.receive::<T>("in")?;
        self.log.push((*value).clone());
        Ok(())
    }
}

/// Passes each value from `in` to `out` unchanged.
pub struct Forwarder<T> {
    _payload: PhantomData<fn() -> T>,
}

impl<T> Forwarder<T> {
    /// Create a forwarder.
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<T> Default for Forwarder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> Operator for Forwarder<T> {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.input::<T>("in");
        spec.output::<T>("out");
    }

    fn tick(
        &mut self,
        input: &mut InputContext,
        output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let message = input.receive_message("in")?;
        output.emit_message("out", message)
    }
}

/// An operator with no ports that records each lifecycle hook it sees and
/// can be told to fail in one phase.
#[derive(Debug)]
pub struct LifecycleProbe {
    label: String,
    log: EventLog,
    ticks: u64,
    fail_at: Option<LifecyclePhase>,
}

impl LifecycleProbe {
    /// A probe that ticks `ticks` times.
    pub fn new(label: impl Into<String>, log: EventLog, ticks: u64) -> Self {
        Self {
            label: label.into(),
            log,
            ticks,
            fail_at: None,
        }
    }

    /// Fail with an operator error when `phase` runs.
    pub fn fail_at(mut self, phase: LifecyclePhase) -> Self {
        self.fail_at = Some(phase);
        self
    }

    fn record(&self, phase: LifecyclePhase) -> Result<()> {
        self.log.push(format!("{}:{}", self.label, phase));
        if self.fail_at == Some(phase) {
            return Err(SluiceError::operator(format!("{} failed in {}", self.label, phase)));
        }
        Ok(())
    }
}

impl Operator for LifecycleProbe {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.condition(CountCondition::new(self.ticks));
        // setup has no error path; a Setup fault is never raised.
        self.log.push(format!("{}:{}", self.label, LifecyclePhase::Setup));
    }

    fn initialize(&mut self, _params: &Parameters) -> Result<()> {
        self.record(LifecyclePhase::Initialize)
    }

    fn start(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.record(LifecyclePhase::Start)
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        self.record(LifecyclePhase::Tick)
    }

    fn stop(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.record(LifecyclePhase::Stop)
    }
}

/// Fails with an operator error in one lifecycle phase.
///
/// Ticks until it fails; a `Tick` failure happens on the first tick.
#[derive(Debug, Clone, Copy)]
pub struct FailingOperator {
    phase: LifecyclePhase,
}

impl FailingOperator {
    /// Fail in `phase`. `Setup` has no error path, so it behaves like a
    /// no-op operator that never becomes ready.
    pub fn new(phase: LifecyclePhase) -> Self {
        Self { phase }
    }

    fn check(&self, phase: LifecyclePhase) -> Result<()> {
        if self.phase == phase {
            return Err(SluiceError::operator(format!("injected {} failure", phase)));
        }
        Ok(())
    }
}

impl Operator for FailingOperator {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        let ticks = if self.phase == LifecyclePhase::Setup { 0 } else { 1 };
        spec.condition(CountCondition::new(ticks));
    }

    fn initialize(&mut self, _params: &Parameters) -> Result<()> {
        self.check(LifecyclePhase::Initialize)
    }

    fn start(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.check(LifecyclePhase::Start)
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        self.check(LifecyclePhase::Tick)
    }

    fn stop(&mut self, _ctx: &ExecutionContext) -> Result<()> {
        self.check(LifecyclePhase::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_log_clones_share_storage() {
        let log = SharedLog::<i64>::new();
        let other = log.clone();
        other.push(4);
        assert_eq!(log.values(), vec![4]);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn probe_records_then_fails_in_chosen_phase() {
        let log = EventLog::new();
        let probe = LifecycleProbe::new("p", log.clone(), 1).fail_at(LifecyclePhase::Start);
        assert!(probe.record(LifecyclePhase::Initialize).is_ok());
        assert!(probe.record(LifecyclePhase::Start).is_err());
        assert_eq!(log.values(), vec!["p:initialize", "p:start"]);
    }

    #[test]
    fn failing_operator_fails_only_in_its_phase() {
        let op = FailingOperator::new(LifecyclePhase::Stop);
        assert!(op.check(LifecyclePhase::Tick).is_ok());
        let err = op.check(LifecyclePhase::Stop).unwrap_err();
        assert_eq!(err.to_string(), "E399: injected stop failure");
    }
}
