//! Lowering a validated graph into schedulable state.
//!
//! Each operator becomes a unit holding its queues' read side, the routes
//! its outputs feed, its full condition set and its tick history. Queues are
//! created once here; the scheduler only moves messages between them.

use super::config::ExecutorConfig;
use super::summary::RoutingFailure;
use crate::graph::FlowGraph;
use sluice_core::condition::{
    Condition, DownstreamAffordable, MessageAvailable, Readiness, ReadinessView, awaits_external,
    evaluate,
};
use sluice_core::context::{ExecutionContext, InputBinding, InputContext, OutputBinding, OutputContext};
use sluice_core::error::{Result, SluiceError};
use sluice_core::message::Message;
use sluice_core::operator::{Lifecycle, LifecycleState, Operator};
use sluice_core::parameter::ArgList;
use sluice_core::port::ConditionPolicy;
use sluice_core::queue::{MessageQueue, SharedQueue};
use sluice_core::resource::ResourceSet;
use sluice_core::shutdown::ShutdownHandle;
use sluice_core::spec::OperatorSpec;
use sluice_core::types::{OperatorId, PortId, RunId};
use sluice_core::validation::ValidationError;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

/// An operator handed to the executor, with everything needed to run it.
pub struct PlanOperator {
    /// Operator ID.
    pub id: OperatorId,
    /// Operator name.
    pub name: String,
    /// The operator itself.
    pub operator: Box<dyn Operator>,
    /// Its declaration, including synthesized receivers and extra conditions.
    pub spec: OperatorSpec,
    /// Explicit arguments given at construction.
    pub explicit_args: ArgList,
    /// Arguments taken from the configuration.
    pub configured_args: ArgList,
    /// Resource aliases (alias -> fragment resource name).
    pub resource_aliases: HashMap<String, String>,
    /// Lifecycle tracker.
    pub lifecycle: Lifecycle,
}

/// A message placed on a feedback edge before the run starts.
#[derive(Debug, Clone)]
pub struct Seed {
    /// Consumer operator.
    pub to: OperatorId,
    /// Consumer input port.
    pub port: String,
    /// The seeded message.
    pub message: Message,
}

/// An operator returned by the executor after a run.
pub struct ReturnedOperator {
    /// Operator ID.
    pub id: OperatorId,
    /// The operator, unless a tick task was lost.
    pub operator: Option<Box<dyn Operator>>,
    /// Its declaration, without the conditions the run consumed.
    pub spec: OperatorSpec,
    /// Final lifecycle state.
    pub lifecycle: Lifecycle,
}

/// Lowering failed; the operators come back untouched.
pub(crate) struct LowerFailure {
    pub(crate) error: SluiceError,
    pub(crate) operators: Vec<ReturnedOperator>,
}

#[derive(Debug)]
struct Route {
    queue: SharedQueue,
    consumer: String,
    label: String,
    broken: bool,
}

pub(crate) struct Unit {
    pub(crate) id: OperatorId,
    pub(crate) name: String,
    pub(crate) operator: Option<Box<dyn Operator>>,
    pub(crate) spec: OperatorSpec,
    pub(crate) explicit_args: ArgList,
    pub(crate) configured_args: ArgList,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) ctx: ExecutionContext,
    pub(crate) ticks: u64,
    conditions: Vec<Box<dyn Condition>>,
    inputs: Vec<InputBinding>,
    outputs: Vec<OutputBinding>,
    routes: HashMap<String, Vec<Route>>,
    last_tick: Option<Instant>,
}

/// Schedulable state for one run.
pub struct ExecutionPlan {
    run_id: RunId,
    pub(crate) units: Vec<Unit>,
    pub(crate) start_order: Vec<usize>,
    pub(crate) shutdown: ShutdownHandle,
}

/// A tick to run, detached from the plan so it can move to another thread.
pub(crate) struct TickJob {
    pub(crate) index: usize,
    name: String,
    operator: Box<dyn Operator>,
    inputs: Vec<InputBinding>,
    outputs: Vec<OutputBinding>,
    ctx: ExecutionContext,
}

pub(crate) struct TickOutcome {
    pub(crate) index: usize,
    operator: Box<dyn Operator>,
    pub(crate) result: Result<()>,
    emitted: Vec<(String, Message)>,
}

impl TickJob {
    pub(crate) fn run(self) -> TickOutcome {
        let TickJob {
            index,
            name,
            mut operator,
            inputs,
            outputs,
            ctx,
        } = self;
        let mut input = InputContext::new(name.clone(), inputs);
        let mut output = OutputContext::new(name, outputs);
        let result = catch_unwind(AssertUnwindSafe(|| {
            operator.tick(&mut input, &mut output, &ctx)
        }))
        .unwrap_or_else(|panic| Err(SluiceError::operator(panic_message(panic.as_ref()))));
        TickOutcome {
            index,
            operator,
            result,
            emitted: output.into_emitted(),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

impl ExecutionPlan {
    /// Lower a graph and its operators into a plan.
    ///
    /// The graph must already be validated. Operators not registered in the
    /// graph are ignored.
    pub fn lower(
        graph: &FlowGraph,
        operators: Vec<PlanOperator>,
        seeds: Vec<Seed>,
        resources: Arc<ResourceSet>,
        shutdown: ShutdownHandle,
        config: &ExecutorConfig,
    ) -> Result<Self> {
        Self::try_lower(graph, operators, seeds, resources, shutdown, config).map_err(|f| f.error)
    }

    /// Like [`lower`](Self::lower), but hands the operators back on failure.
    pub(crate) fn try_lower(
        graph: &FlowGraph,
        operators: Vec<PlanOperator>,
        seeds: Vec<Seed>,
        resources: Arc<ResourceSet>,
        shutdown: ShutdownHandle,
        config: &ExecutorConfig,
    ) -> std::result::Result<Self, LowerFailure> {
        let run_id = RunId::new();
        let mut operators: Vec<PlanOperator> = operators
            .into_iter()
            .filter(|op| graph.contains(op.id))
            .collect();
        operators.sort_by_key(|op| op.id);

        let index: HashMap<OperatorId, usize> = operators
            .iter()
            .enumerate()
            .map(|(i, op)| (op.id, i))
            .collect();

        // A queue must hold everything one producer tick may emit into it.
        let emit_capacity: HashMap<(OperatorId, &str), usize> = operators
            .iter()
            .flat_map(|op| {
                op.spec
                    .outputs()
                    .iter()
                    .map(move |port| ((op.id, port.name.as_str()), port.capacity))
            })
            .collect();
        let mut burst: HashMap<PortId, usize> = HashMap::new();
        for edge in graph.edges() {
            let capacity = emit_capacity
                .get(&(edge.from, edge.from_port.as_str()))
                .copied()
                .unwrap_or(1);
            let slot = burst.entry(PortId::new(edge.to, &edge.to_port)).or_insert(1);
            *slot = (*slot).max(capacity);
        }
        drop(emit_capacity);

        let mut queues: HashMap<PortId, SharedQueue> = HashMap::new();
        let mut units = Vec::with_capacity(operators.len());

        for op in operators {
            let mut inputs = Vec::new();
            let mut conditions: Vec<Box<dyn Condition>> = Vec::new();

            for port in op.spec.inputs().iter().filter(|p| !p.is_repeated()) {
                let connected = graph.edges_into(op.id, &port.name).next().is_some();
                let queue = connected.then(|| {
                    let id = PortId::new(op.id, &port.name);
                    let needed = burst.get(&id).copied().unwrap_or(1);
                    let queue = MessageQueue::shared(
                        port.capacity.max(config.default_queue_capacity).max(needed),
                    );
                    queues.insert(id, Arc::clone(&queue));
                    queue
                });
                if port.policy == ConditionPolicy::Default && (connected || !port.optional) {
                    conditions.push(Box::new(MessageAvailable::new(&port.name, port.min_size)));
                }
                inputs.push(InputBinding {
                    name: port.name.clone(),
                    tag: port.tag,
                    queue,
                    parent: port.parent.clone(),
                });
            }

            let outputs = op
                .spec
                .outputs()
                .iter()
                .map(|port| OutputBinding {
                    name: port.name.clone(),
                    tag: port.tag,
                    capacity: port.capacity,
                })
                .collect();

            let ctx = ExecutionContext::new(
                op.name.clone(),
                run_id,
                Arc::clone(&resources),
                op.resource_aliases,
                shutdown.clone(),
            );

            let mut spec = op.spec;
            for port in spec.outputs() {
                let connected = graph
                    .outgoing_edges(op.id)
                    .any(|e| e.from_port == port.name);
                // One tick may emit up to `capacity` messages; all of them must fit.
                if port.policy == ConditionPolicy::Default && connected {
                    conditions.push(Box::new(DownstreamAffordable::new(
                        &port.name,
                        port.min_size.max(port.capacity),
                    )));
                }
            }
            conditions.extend(spec.take_conditions());

            units.push(Unit {
                id: op.id,
                name: op.name,
                operator: Some(op.operator),
                spec,
                explicit_args: op.explicit_args,
                configured_args: op.configured_args,
                lifecycle: op.lifecycle,
                ctx,
                ticks: 0,
                conditions,
                inputs,
                outputs,
                routes: HashMap::new(),
                last_tick: None,
            });
        }

        let mut plan = Self {
            run_id,
            units,
            start_order: Vec::new(),
            shutdown,
        };
        match plan.wire(graph, &index, &queues, seeds) {
            Ok(()) => Ok(plan),
            Err(error) => Err(LowerFailure {
                error,
                operators: plan.into_operators(),
            }),
        }
    }

    /// Connect routes, place seeds and fix the start order.
    fn wire(
        &mut self,
        graph: &FlowGraph,
        index: &HashMap<OperatorId, usize>,
        queues: &HashMap<PortId, SharedQueue>,
        seeds: Vec<Seed>,
    ) -> Result<()> {
        let units = &mut self.units;
        for edge in graph.edges() {
            let (Some(&from), Some(&to)) = (index.get(&edge.from), index.get(&edge.to)) else {
                continue;
            };
            let label = format!(
                "{}.{} -> {}.{}",
                units[from].name, edge.from_port, units[to].name, edge.to_port
            );
            let queue = queues
                .get(&PortId::new(edge.to, &edge.to_port))
                .cloned()
                .ok_or_else(|| SluiceError::GraphValidation {
                    errors: vec![ValidationError::invalid_reference(&label, &edge.to_port)],
                })?;
            let consumer = units[to].name.clone();
            units[from]
                .routes
                .entry(edge.from_port.clone())
                .or_default()
                .push(Route {
                    queue,
                    consumer,
                    label,
                    broken: false,
                });
        }

        for seed in seeds {
            let Some(&to) = index.get(&seed.to) else {
                continue;
            };
            let queue = queues.get(&PortId::new(seed.to, &seed.port)).ok_or_else(|| {
                SluiceError::UnknownPort {
                    operator: units[to].name.clone(),
                    port: seed.port.clone(),
                    direction: sluice_core::port::PortDirection::Input,
                    available: units[to].inputs.iter().map(|b| b.name.clone()).collect(),
                }
            })?;
            let mut queue = queue.lock();
            let capacity = queue.capacity();
            queue
                .push(seed.message)
                .map_err(|_| SluiceError::CapacityExceeded {
                    operator: units[to].name.clone(),
                    port: seed.port.clone(),
                    capacity,
                })?;
        }

        self.start_order = graph
            .topological_order()?
            .into_iter()
            .filter_map(|id| index.get(&id).copied())
            .collect();
        Ok(())
    }

    /// Identifier of this run.
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Number of scheduled operators.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether no operator is scheduled.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Hand the operators back, in declaration order.
    pub fn into_operators(self) -> Vec<ReturnedOperator> {
        self.units
            .into_iter()
            .map(|unit| ReturnedOperator {
                id: unit.id,
                operator: unit.operator,
                spec: unit.spec,
                lifecycle: unit.lifecycle,
            })
            .collect()
    }

    /// Completed ticks per operator, in declaration order.
    pub(crate) fn tick_counts(&self) -> Vec<(String, u64)> {
        self.units
            .iter()
            .map(|u| (u.name.clone(), u.ticks))
            .collect()
    }

    /// Evaluate an operator's readiness.
    ///
    /// An operator whose tick is in flight is NotReady; once a stop has been
    /// requested every operator is Never.
    pub(crate) fn readiness(&self, index: usize, now: Instant) -> Readiness {
        let unit = &self.units[index];
        if unit.operator.is_none() {
            return Readiness::NotReady;
        }
        let shutdown = self.shutdown.is_requested();
        if shutdown {
            return Readiness::Never;
        }
        let view = UnitView {
            unit,
            now,
            shutdown,
        };
        evaluate(&unit.conditions, &view)
    }

    /// Whether a NotReady operator is waiting only on outside toggles.
    pub(crate) fn awaits_external(&self, index: usize, now: Instant) -> bool {
        let unit = &self.units[index];
        if unit.operator.is_none() || self.shutdown.is_requested() {
            return false;
        }
        let view = UnitView {
            unit,
            now,
            shutdown: false,
        };
        awaits_external(&unit.conditions, &view)
    }

    /// Detach an operator for one tick.
    pub(crate) fn begin_tick(&mut self, index: usize) -> Result<TickJob> {
        let unit = &mut self.units[index];
        let operator = unit.operator.take().ok_or_else(|| SluiceError::InvalidTransition {
            operator: unit.name.clone(),
            from: unit.lifecycle.state(),
            to: LifecycleState::Running,
        })?;
        if let Err(e) = unit.lifecycle.advance(LifecycleState::Running) {
            unit.operator = Some(operator);
            return Err(e);
        }
        unit.last_tick = Some(Instant::now());
        tracing::trace!(operator = %unit.name, tick = unit.ticks, "Tick");
        Ok(TickJob {
            index,
            name: unit.name.clone(),
            operator,
            inputs: unit.inputs.clone(),
            outputs: unit.outputs.clone(),
            ctx: unit.ctx.with_tick_count(unit.ticks),
        })
    }

    /// Reattach the operator after a tick and take its outputs.
    pub(crate) fn finish_tick(&mut self, outcome: TickOutcome) -> (Result<()>, Vec<(String, Message)>) {
        let unit = &mut self.units[outcome.index];
        unit.operator = Some(outcome.operator);
        if outcome.result.is_ok() {
            unit.ticks += 1;
        }
        (outcome.result, outcome.emitted)
    }

    /// Route a tick's outputs into the downstream queues, in emission order.
    ///
    /// A full queue disables its edge for the rest of the run and is recorded
    /// as a routing failure; other edges keep flowing.
    pub(crate) fn deliver(
        &mut self,
        index: usize,
        emitted: Vec<(String, Message)>,
        failures: &mut Vec<RoutingFailure>,
    ) {
        let unit = &mut self.units[index];
        for (port, message) in emitted {
            let Some(routes) = unit.routes.get_mut(&port) else {
                tracing::trace!(operator = %unit.name, port = %port, "Output port unconnected, message dropped");
                continue;
            };
            for route in routes.iter_mut().filter(|r| !r.broken) {
                let mut queue = route.queue.lock();
                let capacity = queue.capacity();
                if queue.push(message.clone()).is_err() {
                    route.broken = true;
                    let error = SluiceError::CapacityExceeded {
                        operator: route.consumer.clone(),
                        port: route.label.clone(),
                        capacity,
                    };
                    tracing::error!(edge = %route.label, error = %error, "Delivery failed, disabling edge");
                    failures.push(RoutingFailure {
                        edge: route.label.clone(),
                        error,
                    });
                }
            }
        }
    }
}

struct UnitView<'a> {
    unit: &'a Unit,
    now: Instant,
    shutdown: bool,
}

impl ReadinessView for UnitView<'_> {
    fn input_len(&self, port: &str) -> Option<usize> {
        let mut found = false;
        let mut total = 0;
        for binding in &self.unit.inputs {
            if binding.name == port || binding.parent.as_deref() == Some(port) {
                found = true;
                total += binding.queue.as_ref().map_or(0, |q| q.lock().len());
            }
        }
        found.then_some(total)
    }

    fn downstream_room(&self, port: &str) -> Option<usize> {
        self.unit
            .routes
            .get(port)?
            .iter()
            .filter(|r| !r.broken)
            .map(|r| r.queue.lock().available())
            .min()
    }

    fn tick_count(&self) -> u64 {
        self.unit.ticks
    }

    fn last_tick(&self) -> Option<Instant> {
        self.unit.last_tick
    }

    fn now(&self) -> Instant {
        self.now
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    struct Burst;

    impl Operator for Burst {
        fn setup(&mut self, spec: &mut OperatorSpec) {
            spec.output::<i64>("out").capacity(3);
        }
    }

    struct Sink;

    impl Operator for Sink {
        fn setup(&mut self, spec: &mut OperatorSpec) {
            spec.input::<i64>("in");
        }
    }

    fn plan_operator(n: u32, name: &str, mut operator: Box<dyn Operator>) -> PlanOperator {
        let mut spec = OperatorSpec::default();
        operator.setup(&mut spec);
        PlanOperator {
            id: OperatorId::new(n),
            name: name.to_string(),
            operator,
            spec,
            explicit_args: ArgList::default(),
            configured_args: ArgList::default(),
            resource_aliases: HashMap::new(),
            lifecycle: Lifecycle::new(name),
        }
    }

    fn try_lower(
        graph: &FlowGraph,
        seeds: Vec<Seed>,
    ) -> std::result::Result<ExecutionPlan, LowerFailure> {
        let operators = vec![
            plan_operator(0, "burst", Box::new(Burst)),
            plan_operator(1, "sink", Box::new(Sink)),
        ];
        ExecutionPlan::try_lower(
            graph,
            operators,
            seeds,
            Arc::new(ResourceSet::new()),
            ShutdownHandle::new(),
            &ExecutorConfig::default(),
        )
    }

    fn graph(connected: bool) -> FlowGraph {
        let mut graph = FlowGraph::new();
        graph.add_operator(OperatorId::new(0), "burst");
        graph.add_operator(OperatorId::new(1), "sink");
        if connected {
            graph.add_edge(Edge::new(OperatorId::new(0), "out", OperatorId::new(1), "in"));
        }
        graph
    }

    #[test]
    fn queue_holds_a_full_producer_tick() {
        let plan = try_lower(&graph(true), Vec::new())
            .map_err(|f| f.error)
            .unwrap();
        let queue = plan.units[1].inputs[0].queue.as_ref().unwrap();
        assert_eq!(queue.lock().capacity(), 3);

        // The producer waits until all three slots are free.
        queue.lock().push(Message::new(1i64)).unwrap();
        assert_eq!(plan.readiness(0, Instant::now()), Readiness::NotReady);
    }

    #[test]
    fn failed_lowering_returns_the_operators() {
        let seed = Seed {
            to: OperatorId::new(1),
            port: "in".to_string(),
            message: Message::new(0i64),
        };
        let failure = match try_lower(&graph(false), vec![seed]) {
            Ok(_) => panic!("seed on an unconnected port must fail"),
            Err(failure) => failure,
        };
        assert!(matches!(failure.error, SluiceError::UnknownPort { .. }));
        assert_eq!(failure.operators.len(), 2);
        assert!(failure.operators.iter().all(|op| op.operator.is_some()));
        assert_eq!(failure.operators[1].spec.inputs()[0].name, "in");
    }
}
