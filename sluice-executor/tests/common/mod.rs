//! Common test utilities for integration tests.

#![allow(dead_code)]

use sluice_core::prelude::*;
use sluice_core::port::ConditionPolicy;
use sluice_executor::scheduler::{ExecutorConfig, SchedulerPolicy};
use sluice_executor::testing::SharedLog;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Emits `count` values on two outputs, `even` and `odd`.
pub struct Splitter;

impl Operator for Splitter {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.output::<i64>("even");
        spec.output::<i64>("odd");
        spec.condition(CountCondition::new(1));
    }
}

/// Records each batch drained from `in` once at least `batch` values wait.
pub struct BatchSink {
    batch: usize,
    log: SharedLog<Vec<i64>>,
}

impl BatchSink {
    pub fn new(batch: usize) -> (Self, SharedLog<Vec<i64>>) {
        let log = SharedLog::new();
        (
            Self {
                batch,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Operator for BatchSink {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.input::<i64>("in").capacity(self.batch).min_size(self.batch);
    }

    fn tick(
        &mut self,
        input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let values = input.receive_all::<i64>("in")?;
        self.log.push(values.iter().map(|v| **v).collect());
        Ok(())
    }
}

/// Emits `count` values without waiting for downstream room.
pub struct Flood {
    count: u64,
}

impl Flood {
    pub fn new(count: u64) -> Self {
        Self { count }
    }
}

impl Operator for Flood {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.output::<i64>("out").condition_policy(ConditionPolicy::None);
        spec.condition(CountCondition::new(self.count));
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        output: &mut OutputContext,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        output.emit("out", ctx.tick_count() as i64)
    }
}

/// Emits two consecutive values per tick, for `ticks` ticks.
pub struct Pair {
    ticks: u64,
}

impl Pair {
    pub fn new(ticks: u64) -> Self {
        Self { ticks }
    }
}

impl Operator for Pair {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.output::<i64>("out").capacity(2);
        spec.condition(CountCondition::new(self.ticks));
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        output: &mut OutputContext,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let base = ctx.tick_count() as i64 * 2;
        output.emit("out", base)?;
        output.emit("out", base + 1)
    }
}

/// Needs a `threshold` parameter with no default and records it per tick.
pub struct Threshold {
    threshold: f64,
    log: SharedLog<f64>,
}

impl Threshold {
    pub fn new() -> (Self, SharedLog<f64>) {
        let log = SharedLog::new();
        (
            Self {
                threshold: 0.0,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Operator for Threshold {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.param::<f64>("threshold", "cut-off value");
        spec.condition(CountCondition::new(1));
    }

    fn initialize(&mut self, params: &Parameters) -> Result<()> {
        self.threshold = params.get("threshold")?;
        Ok(())
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        self.log.push(self.threshold);
        Ok(())
    }
}

/// Reads a `period` parameter through the duration converter.
pub struct Interval {
    log: SharedLog<Duration>,
}

impl Interval {
    pub fn new() -> (Self, SharedLog<Duration>) {
        let log = SharedLog::new();
        (Self { log: log.clone() }, log)
    }
}

impl Operator for Interval {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.param::<Duration>("period", "tick period");
        spec.condition(CountCondition::new(1));
    }

    fn initialize(&mut self, params: &Parameters) -> Result<()> {
        self.log.push(params.get::<Duration>("period")?);
        Ok(())
    }
}

/// Requests a stop on its `n`th tick. Has no conditions, so it is always ready.
pub struct StopAfter {
    n: u64,
}

impl StopAfter {
    pub fn new(n: u64) -> Self {
        Self { n }
    }
}

impl Operator for StopAfter {
    fn setup(&mut self, _spec: &mut OperatorSpec) {}

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        if ctx.tick_count() + 1 == self.n {
            ctx.request_shutdown();
        }
        Ok(())
    }
}

/// Ticks once per period, forever.
pub struct Periodic {
    period: Duration,
}

impl Periodic {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }
}

impl Operator for Periodic {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.condition(PeriodicCondition::new(self.period));
    }
}

/// Panics on its first tick.
pub struct Panicker;

impl Operator for Panicker {
    fn setup(&mut self, _spec: &mut OperatorSpec) {}

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        panic!("boom");
    }
}

/// Sums one value from every receiver of the repeated input `values`.
pub struct Gather {
    log: SharedLog<Vec<i64>>,
}

impl Gather {
    pub fn new() -> (Self, SharedLog<Vec<i64>>) {
        let log = SharedLog::new();
        (Self { log: log.clone() }, log)
    }
}

impl Operator for Gather {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.repeated_input::<i64>("values");
    }

    fn tick(
        &mut self,
        input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let values = input.receive_all::<i64>("values")?;
        self.log.push(values.iter().map(|v| **v).collect());
        Ok(())
    }
}

/// Receives a value, records it and emits it plus one.
pub struct Incrementer {
    limit: u64,
    log: SharedLog<i64>,
}

impl Incrementer {
    pub fn new(limit: u64) -> (Self, SharedLog<i64>) {
        let log = SharedLog::new();
        (
            Self {
                limit,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Operator for Incrementer {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.input::<i64>("in");
        spec.output::<i64>("out");
        spec.condition(CountCondition::new(self.limit));
    }

    fn tick(
        &mut self,
        input: &mut InputContext,
        output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let value = *input.receive::<i64>("in")?;
        self.log.push(value);
        output.emit("out", value + 1)
    }
}

/// Takes a block from the `pool` resource on every tick.
pub struct PoolUser {
    ticks: u64,
    log: SharedLog<usize>,
}

impl PoolUser {
    pub fn new(ticks: u64) -> (Self, SharedLog<usize>) {
        let log = SharedLog::new();
        (
            Self {
                ticks,
                log: log.clone(),
            },
            log,
        )
    }
}

impl Operator for PoolUser {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.resource("pool");
        spec.condition(CountCondition::new(self.ticks));
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        ctx: &ExecutionContext,
    ) -> Result<()> {
        let pool = ctx.resource::<BlockMemoryPool>("pool")?;
        let block = pool
            .allocate()
            .ok_or_else(|| SluiceError::operator("pool exhausted"))?;
        self.log.push(block.len());
        Ok(())
    }
}

/// Sleeps inside each tick and tracks how many ticks overlap.
pub struct Sleeper {
    ticks: u64,
    nap: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl Sleeper {
    pub fn new(ticks: u64, nap: Duration, active: Arc<AtomicUsize>, peak: Arc<AtomicUsize>) -> Self {
        Self {
            ticks,
            nap,
            active,
            peak,
        }
    }
}

impl Operator for Sleeper {
    fn setup(&mut self, spec: &mut OperatorSpec) {
        spec.condition(CountCondition::new(self.ticks));
    }

    fn tick(
        &mut self,
        _input: &mut InputContext,
        _output: &mut OutputContext,
        _ctx: &ExecutionContext,
    ) -> Result<()> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(self.nap);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Executor config for the multi-threaded policy.
pub fn parallel_config(workers: usize) -> ExecutorConfig {
    ExecutorConfig::default()
        .with_policy(SchedulerPolicy::MultiThread)
        .with_worker_threads(workers)
}
