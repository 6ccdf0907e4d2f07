//! The composition root.
//!
//! A [`Fragment`] owns the operators of one pipeline, the graph connecting
//! them, the configuration, the registry and the shared resources, and runs
//! them with an [`Executor`].
//!
//! # Example
//!
//! ```no_run
//! use sluice_executor::prelude::*;
//! use sluice_executor::testing::{CountingSource, RecordingSink};
//!
//! # async fn example() -> sluice_core::Result<()> {
//! let mut fragment = Fragment::new("ping");
//! let source = fragment.make_operator("source", CountingSource::new(3))?;
//! let (sink_op, log) = RecordingSink::<i64>::new();
//! let sink = fragment.make_operator("sink", sink_op)?;
//! fragment.add_flow(source, sink, &[])?;
//!
//! let summary = fragment.run().await?;
//! assert_eq!(log.values(), vec![1, 2, 3]);
//! assert_eq!(summary.termination, Termination::Drained);
//! # Ok(())
//! # }
//! ```

mod builder;
mod wiring;

pub use builder::{OperatorBuilder, OperatorHandle};

use crate::graph::{self, Edge, FlowGraph, NodeContract};
use crate::scheduler::{
    ExecutionPlan, Executor, ExecutorConfig, PlanOperator, ReturnedOperator, RunSummary, Seed,
};
use sluice_core::config::Config;
use sluice_core::error::{Result, SluiceError};
use sluice_core::message::Message;
use sluice_core::operator::{Lifecycle, LifecycleState, Operator};
use sluice_core::parameter::ArgList;
use sluice_core::registry::Registry;
use sluice_core::resource::{Resource, ResourceSet};
use sluice_core::shutdown::ShutdownHandle;
use sluice_core::spec::OperatorSpec;
use sluice_core::types::OperatorId;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use wiring::{Pairing, Side, Target};

struct OperatorSlot {
    id: OperatorId,
    name: String,
    operator: Option<Box<dyn Operator>>,
    spec: OperatorSpec,
    args: ArgList,
    config_keys: Vec<String>,
    resource_aliases: HashMap<String, String>,
    lifecycle: Lifecycle,
}

/// The composition root of a pipeline.
pub struct Fragment {
    name: String,
    slots: Vec<OperatorSlot>,
    by_name: HashMap<String, OperatorId>,
    graph: FlowGraph,
    seeds: Vec<Seed>,
    config: Config,
    registry: Registry,
    resources: ResourceSet,
    executor_config: ExecutorConfig,
    shutdown: ShutdownHandle,
    has_run: bool,
}

impl Fragment {
    /// Create an empty fragment with the default registry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: Vec::new(),
            by_name: HashMap::new(),
            graph: FlowGraph::new(),
            seeds: Vec::new(),
            config: Config::empty(),
            registry: Registry::with_defaults(),
            resources: ResourceSet::new(),
            executor_config: ExecutorConfig::default(),
            shutdown: ShutdownHandle::new(),
            has_run: false,
        }
    }

    /// The fragment name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replace the configuration document.
    pub fn set_config(&mut self, config: Config) -> &mut Self {
        self.config = config;
        self
    }

    /// Load the configuration document from a file.
    pub fn load_config(&mut self, path: impl AsRef<std::path::Path>) -> Result<&mut Self> {
        self.config = Config::from_file(path)?;
        Ok(self)
    }

    /// The configuration document.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Replace the registry.
    pub fn set_registry(&mut self, registry: Registry) -> &mut Self {
        self.registry = registry;
        self
    }

    /// The registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable access to the registry.
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Replace the executor configuration.
    pub fn set_executor_config(&mut self, config: ExecutorConfig) -> &mut Self {
        self.executor_config = config;
        self
    }

    /// The executor configuration.
    pub fn executor_config(&self) -> &ExecutorConfig {
        &self.executor_config
    }

    /// Load every extension named in the configuration's `extensions:` list.
    ///
    /// Returns the names loaded. Fails on the first name no registered
    /// extension answers to.
    pub fn load_extensions(&mut self) -> Result<Vec<String>> {
        let names = self.config.extensions();
        for name in &names {
            self.registry.load(name)?;
        }
        Ok(names)
    }

    /// Start declaring an operator.
    pub fn operator(&mut self, name: impl Into<String>, operator: impl Operator) -> OperatorBuilder<'_> {
        OperatorBuilder::new(self, name.into(), Box::new(operator))
    }

    /// Start declaring an operator created by a registered factory.
    pub fn operator_of_type(
        &mut self,
        name: impl Into<String>,
        type_name: &str,
    ) -> Result<OperatorBuilder<'_>> {
        let operator = self.registry.create(type_name)?;
        Ok(OperatorBuilder::new(self, name.into(), operator))
    }

    /// Declare an operator with no extra arguments.
    pub fn make_operator(&mut self, name: impl Into<String>, operator: impl Operator) -> Result<OperatorHandle> {
        self.operator(name, operator).build()
    }

    /// Register a declared operator in the graph. Adding it twice is a no-op.
    pub fn add_operator(&mut self, handle: OperatorHandle) -> Result<()> {
        let slot = self.slot(handle)?;
        let (id, name) = (slot.id, slot.name.clone());
        if self.graph.add_operator(id, name) {
            tracing::trace!(operator = %id, "Operator added to graph");
        }
        Ok(())
    }

    /// Connect `upstream` to `downstream`.
    ///
    /// Each pair is `(output port, input port)`. With no pairs, both
    /// operators must have exactly one port of the relevant direction; an
    /// empty name on either side means the same. Wiring onto a repeated
    /// input synthesizes its next receiver (`name:0`, `name:1`, ...).
    pub fn add_flow(
        &mut self,
        upstream: OperatorHandle,
        downstream: OperatorHandle,
        pairs: &[(&str, &str)],
    ) -> Result<()> {
        self.connect(upstream, downstream, pairs, false, None)
    }

    /// Connect `upstream` to `downstream` with feedback edges.
    ///
    /// Feedback edges may close a cycle. A seed message, if given, is placed
    /// on each new edge's queue before the run starts so the cycle can begin.
    pub fn add_feedback_flow(
        &mut self,
        upstream: OperatorHandle,
        downstream: OperatorHandle,
        pairs: &[(&str, &str)],
        seed: Option<Message>,
    ) -> Result<()> {
        self.connect(upstream, downstream, pairs, true, seed)
    }

    fn connect(
        &mut self,
        upstream: OperatorHandle,
        downstream: OperatorHandle,
        pairs: &[(&str, &str)],
        feedback: bool,
        seed: Option<Message>,
    ) -> Result<()> {
        let up = self.slot(upstream)?;
        let down = self.slot(downstream)?;
        let pairings = wiring::resolve(
            Side {
                name: &up.name,
                spec: &up.spec,
            },
            Side {
                name: &down.name,
                spec: &down.spec,
            },
            pairs,
        )?;

        if let Some(seed) = &seed {
            for pairing in &pairings {
                let port = match &pairing.target {
                    Target::Port(name) | Target::Repeated(name) => name,
                };
                if let Some(spec) = down.spec.port(sluice_core::port::PortDirection::Input, port) {
                    if !seed.is_empty() && !spec.tag.accepts(&seed.tag()) {
                        return Err(SluiceError::PortTypeMismatch {
                            location: format!("seed -> {}.{}", down.name, port),
                            expected: spec.tag.name().to_string(),
                            actual: seed.tag().name().to_string(),
                        });
                    }
                }
            }
        }

        self.add_operator(upstream)?;
        self.add_operator(downstream)?;

        let (from, to) = (upstream.id(), downstream.id());
        for Pairing { output, target } in pairings {
            let to_port = match target {
                Target::Port(name) => name,
                Target::Repeated(parent) => {
                    let slot = &mut self.slots[to.index()];
                    slot.spec.add_repeated_child(&parent).ok_or_else(|| SluiceError::PortPairing {
                        operator: slot.name.clone(),
                        cause: format!("'{}' is not a repeated input", parent),
                    })?
                }
            };
            let mut edge = Edge::new(from, output, to, to_port.clone());
            if feedback {
                edge = edge.feedback();
            }
            tracing::debug!(
                from = %self.slots[from.index()].name,
                from_port = %edge.from_port,
                to = %self.slots[to.index()].name,
                to_port = %to_port,
                feedback,
                "Flow added"
            );
            if self.graph.add_edge(edge) {
                if let Some(message) = &seed {
                    self.seeds.push(Seed {
                        to,
                        port: to_port,
                        message: message.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Add a resource operators can look up by name.
    pub fn add_resource<R: Resource>(&mut self, name: impl Into<String>, resource: Arc<R>) -> &mut Self {
        self.resources.insert(name, resource);
        self
    }

    /// A handle for requesting a graceful stop, usable from any thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Handle of the operator with this name.
    pub fn handle(&self, name: &str) -> Option<OperatorHandle> {
        self.by_name.get(name).copied().map(OperatorHandle::new)
    }

    /// Name of a declared operator.
    pub fn operator_name(&self, handle: OperatorHandle) -> Option<&str> {
        self.slots.get(handle.id().index()).map(|s| s.name.as_str())
    }

    /// Declaration of an operator, including synthesized receivers.
    pub fn spec(&self, handle: OperatorHandle) -> Option<&OperatorSpec> {
        self.slots.get(handle.id().index()).map(|s| &s.spec)
    }

    /// Current lifecycle state of an operator.
    pub fn lifecycle_state(&self, handle: OperatorHandle) -> Option<LifecycleState> {
        self.slots.get(handle.id().index()).map(|s| s.lifecycle.state())
    }

    /// The flow graph.
    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Validate the graph, reporting every defect.
    pub fn validate(&self) -> Result<()> {
        let errors = graph::validate(&self.graph, |id| {
            self.slots.get(id.index()).map(|slot| NodeContract {
                name: &slot.name,
                spec: &slot.spec,
            })
        });
        if errors.is_empty() {
            return Ok(());
        }
        for error in &errors {
            tracing::error!(fragment = %self.name, error = %error, "Graph validation error");
        }
        Err(SluiceError::GraphValidation { errors })
    }

    fn check_resources(&self) -> Result<()> {
        for slot in self.slots.iter().filter(|s| self.graph.contains(s.id)) {
            for alias in slot.spec.resources() {
                let name = slot.resource_aliases.get(alias).unwrap_or(alias);
                if !self.resources.contains(name) {
                    return Err(SluiceError::ResourceNotFound {
                        operator: slot.name.clone(),
                        resource: name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Validate, then run every operator in the graph to termination.
    ///
    /// A fragment runs once; a second call fails with `AlreadyRan`.
    #[instrument(skip(self), fields(fragment = %self.name))]
    pub async fn run(&mut self) -> Result<RunSummary> {
        if self.has_run {
            return Err(SluiceError::AlreadyRan {
                fragment: self.name.clone(),
            });
        }
        self.validate()?;
        self.check_resources()?;

        let mut operators = Vec::with_capacity(self.graph.len());
        for slot in self.slots.iter_mut().filter(|s| self.graph.contains(s.id)) {
            let Some(operator) = slot.operator.take() else {
                continue;
            };
            let mut configured = self.config.operator_overrides(&slot.name);
            for key in &slot.config_keys {
                configured.extend(self.config.from_config(key));
            }
            operators.push(PlanOperator {
                id: slot.id,
                name: slot.name.clone(),
                operator,
                spec: std::mem::take(&mut slot.spec),
                explicit_args: slot.args.clone(),
                configured_args: configured,
                resource_aliases: slot.resource_aliases.clone(),
                lifecycle: slot.lifecycle.clone(),
            });
        }

        let lowered = ExecutionPlan::try_lower(
            &self.graph,
            operators,
            self.seeds.clone(),
            Arc::new(self.resources.clone()),
            self.shutdown.clone(),
            &self.executor_config,
        );
        let mut plan = match lowered {
            Ok(plan) => plan,
            Err(failure) => {
                self.restore(failure.operators);
                return Err(failure.error);
            }
        };
        self.has_run = true;
        self.seeds.clear();

        let executor = Executor::new(self.executor_config.clone());
        let result = executor.run(&mut plan, &self.registry).await;
        self.restore(plan.into_operators());
        result
    }

    fn restore(&mut self, operators: Vec<ReturnedOperator>) {
        for returned in operators {
            if let Some(slot) = self.slots.get_mut(returned.id.index()) {
                slot.operator = returned.operator;
                slot.spec = returned.spec;
                slot.lifecycle = returned.lifecycle;
            }
        }
    }

    /// Run on a new multi-threaded tokio runtime, blocking the caller.
    pub fn run_blocking(&mut self) -> Result<RunSummary> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.executor_config.worker_threads.max(1))
            .enable_all()
            .build()
            .map_err(|e| SluiceError::config(format!("failed to build tokio runtime: {}", e)))?;
        runtime.block_on(self.run())
    }

    fn slot(&self, handle: OperatorHandle) -> Result<&OperatorSlot> {
        self.slots
            .get(handle.id().index())
            .ok_or_else(|| SluiceError::OperatorNotFound {
                name: handle.id().to_string(),
            })
    }
}

impl std::fmt::Debug for Fragment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragment")
            .field("name", &self.name)
            .field("operators", &self.slots.iter().map(|s| &s.name).collect::<Vec<_>>())
            .field("edges", &self.graph.edges().len())
            .field("has_run", &self.has_run)
            .finish()
    }
}
