//! Graph validation.
//!
//! Every check runs to completion and every defect is collected, so a graph
//! with several independent wiring mistakes reports all of them at once.

use super::FlowGraph;
use sluice_core::port::PortDirection;
use sluice_core::spec::OperatorSpec;
use sluice_core::types::OperatorId;
use sluice_core::validation::ValidationError;
use std::collections::{BTreeMap, HashMap};

/// What the validator needs to know about an operator.
#[derive(Debug, Clone, Copy)]
pub struct NodeContract<'a> {
    /// Operator name.
    pub name: &'a str,
    /// The operator's declaration.
    pub spec: &'a OperatorSpec,
}

/// Validate a graph against the declarations of its operators.
///
/// Returns every defect found, in a stable order: reference errors, then
/// per-operator port errors in declaration order, then cycles.
pub fn validate<'a, F>(graph: &FlowGraph, lookup: F) -> Vec<ValidationError>
where
    F: Fn(OperatorId) -> Option<NodeContract<'a>>,
{
    let mut errors = Vec::new();
    check_references(graph, &lookup, &mut errors);
    check_bindings(graph, &lookup, &mut errors);
    check_cycles(graph, &lookup, &mut errors);
    errors
}

fn check_references<'a, F>(graph: &FlowGraph, lookup: &F, errors: &mut Vec<ValidationError>)
where
    F: Fn(OperatorId) -> Option<NodeContract<'a>>,
{
    for id in graph.node_ids() {
        if lookup(id).is_none() {
            errors.push(ValidationError::invalid_reference(id.to_string(), "operator declaration"));
        }
    }

    for edge in graph.edges() {
        let location = format!("{}.{} -> {}.{}", edge.from, edge.from_port, edge.to, edge.to_port);
        let producer = graph.contains(edge.from).then(|| lookup(edge.from)).flatten();
        let consumer = graph.contains(edge.to).then(|| lookup(edge.to)).flatten();

        match producer {
            None => errors.push(ValidationError::invalid_reference(&location, &edge.from.to_string())),
            Some(c) if c.spec.port(PortDirection::Output, &edge.from_port).is_none() => {
                errors.push(ValidationError::invalid_reference(
                    &location,
                    &format!("{}.{}", c.name, edge.from_port),
                ))
            }
            Some(_) => {}
        }
        match consumer {
            None => errors.push(ValidationError::invalid_reference(&location, &edge.to.to_string())),
            Some(c) => {
                let port = c.spec.port(PortDirection::Input, &edge.to_port);
                if port.is_none_or(|p| p.is_repeated()) {
                    errors.push(ValidationError::invalid_reference(
                        &location,
                        &format!("{}.{}", c.name, edge.to_port),
                    ));
                }
            }
        }
    }
}

fn check_bindings<'a, F>(graph: &FlowGraph, lookup: &F, errors: &mut Vec<ValidationError>)
where
    F: Fn(OperatorId) -> Option<NodeContract<'a>>,
{
    for id in graph.node_ids() {
        let Some(contract) = lookup(id) else { continue };

        let mut producers: HashMap<&str, Vec<String>> = HashMap::new();
        for edge in graph.incoming_edges(id) {
            let name = graph
                .node(edge.from)
                .map(|n| n.name.as_str())
                .unwrap_or("?");
            producers
                .entry(edge.to_port.as_str())
                .or_default()
                .push(format!("{}.{}", name, edge.from_port));
        }

        for port in contract.spec.inputs() {
            if port.is_repeated() {
                if !port.optional && contract.spec.children_of(&port.name).next().is_none() {
                    errors.push(ValidationError::unbound_input(contract.name, &port.name));
                }
                continue;
            }
            match producers.get(port.name.as_str()).map(Vec::len).unwrap_or(0) {
                0 if !port.optional || port.is_synthesized() => {
                    errors.push(ValidationError::unbound_input(contract.name, &port.name));
                }
                0 | 1 => {}
                _ => errors.push(ValidationError::fan_in(
                    contract.name,
                    &port.name,
                    &producers[port.name.as_str()],
                )),
            }
        }
    }
}

/// Tarjan's strongly connected components over the forward edges. Every
/// component with more than one member, and every self-loop, is a cycle.
fn check_cycles<'a, F>(graph: &FlowGraph, lookup: &F, errors: &mut Vec<ValidationError>)
where
    F: Fn(OperatorId) -> Option<NodeContract<'a>>,
{
    let mut adjacency: BTreeMap<OperatorId, Vec<OperatorId>> =
        graph.node_ids().map(|id| (id, Vec::new())).collect();
    let mut self_loops = Vec::new();
    for edge in graph.edges().iter().filter(|e| !e.feedback) {
        if edge.from == edge.to {
            if !self_loops.contains(&edge.from) {
                self_loops.push(edge.from);
            }
            continue;
        }
        if let Some(next) = adjacency.get_mut(&edge.from) {
            if graph.contains(edge.to) {
                next.push(edge.to);
            }
        }
    }

    let mut components = Tarjan::new(&adjacency).run();
    components.retain(|c| c.len() > 1);
    for id in self_loops {
        components.push(vec![id]);
    }

    let name_of = |id: OperatorId| {
        lookup(id)
            .map(|c| c.name.to_string())
            .unwrap_or_else(|| id.to_string())
    };
    for mut component in components {
        component.sort();
        let members: Vec<String> = component.into_iter().map(name_of).collect();
        errors.push(ValidationError::illegal_cycle(&members));
    }
}

struct Tarjan<'g> {
    adjacency: &'g BTreeMap<OperatorId, Vec<OperatorId>>,
    index: usize,
    indices: HashMap<OperatorId, usize>,
    lowlink: HashMap<OperatorId, usize>,
    stack: Vec<OperatorId>,
    on_stack: HashMap<OperatorId, bool>,
    components: Vec<Vec<OperatorId>>,
}

impl<'g> Tarjan<'g> {
    fn new(adjacency: &'g BTreeMap<OperatorId, Vec<OperatorId>>) -> Self {
        Self {
            adjacency,
            index: 0,
            indices: HashMap::new(),
            lowlink: HashMap::new(),
            stack: Vec::new(),
            on_stack: HashMap::new(),
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<Vec<OperatorId>> {
        let roots: Vec<OperatorId> = self.adjacency.keys().copied().collect();
        for id in roots {
            if !self.indices.contains_key(&id) {
                self.connect(id);
            }
        }
        self.components.sort_by_key(|c| c.iter().min().copied());
        self.components
    }

    fn connect(&mut self, v: OperatorId) {
        self.indices.insert(v, self.index);
        self.lowlink.insert(v, self.index);
        self.index += 1;
        self.stack.push(v);
        self.on_stack.insert(v, true);

        let successors = self.adjacency.get(&v).cloned().unwrap_or_default();
        for w in successors {
            if !self.indices.contains_key(&w) {
                self.connect(w);
                let low = self.lowlink[&v].min(self.lowlink[&w]);
                self.lowlink.insert(v, low);
            } else if self.on_stack.get(&w).copied().unwrap_or(false) {
                let low = self.lowlink[&v].min(self.indices[&w]);
                self.lowlink.insert(v, low);
            }
        }

        if self.lowlink[&v] == self.indices[&v] {
            let mut component = Vec::new();
            while let Some(w) = self.stack.pop() {
                self.on_stack.insert(w, false);
                component.push(w);
                if w == v {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use sluice_core::validation::ValidationErrorKind;

    struct Fixture {
        names: Vec<String>,
        specs: Vec<OperatorSpec>,
        graph: FlowGraph,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                names: Vec::new(),
                specs: Vec::new(),
                graph: FlowGraph::new(),
            }
        }

        fn add(&mut self, name: &str, build: impl FnOnce(&mut OperatorSpec)) -> OperatorId {
            let id = OperatorId::new(self.names.len() as u32);
            let mut spec = OperatorSpec::new();
            build(&mut spec);
            self.names.push(name.to_string());
            self.specs.push(spec);
            self.graph.add_operator(id, name);
            id
        }

        fn validate(&self) -> Vec<ValidationError> {
            validate(&self.graph, |id| {
                Some(NodeContract {
                    name: self.names.get(id.index())?,
                    spec: self.specs.get(id.index())?,
                })
            })
        }
    }

    fn passthrough(spec: &mut OperatorSpec) {
        spec.input::<i32>("in");
        spec.output::<i32>("out");
    }

    #[test]
    fn valid_chain_has_no_errors() {
        let mut f = Fixture::new();
        let a = f.add("a", |s| {
            s.output::<i32>("out");
        });
        let b = f.add("b", passthrough);
        let c = f.add("c", |s| {
            s.input::<i32>("in");
        });
        f.graph.add_edge(Edge::new(a, "out", b, "in"));
        f.graph.add_edge(Edge::new(b, "out", c, "in"));
        assert!(f.validate().is_empty());
    }

    #[test]
    fn reports_every_defect() {
        let mut f = Fixture::new();
        let a = f.add("a", |s| {
            s.output::<i32>("out");
        });
        let b = f.add("b", |s| {
            s.output::<i32>("out");
        });
        let sink = f.add("sink", |s| {
            s.input::<i32>("in");
            s.input::<i32>("aux");
            s.input::<i32>("maybe").optional();
        });
        f.graph.add_edge(Edge::new(a, "out", sink, "in"));
        f.graph.add_edge(Edge::new(b, "out", sink, "in"));
        f.graph.add_edge(Edge::new(a, "missing", sink, "maybe"));

        let kinds: Vec<_> = f.validate().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ValidationErrorKind::InvalidReference,
                ValidationErrorKind::FanIn,
                ValidationErrorKind::UnboundInput,
            ]
        );
    }

    #[test]
    fn unmarked_cycle_is_rejected() {
        let mut f = Fixture::new();
        let a = f.add("a", passthrough);
        let b = f.add("b", passthrough);
        f.graph.add_edge(Edge::new(a, "out", b, "in"));
        f.graph.add_edge(Edge::new(b, "out", a, "in"));
        let errors = f.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::IllegalCycle);
        assert_eq!(errors[0].location, "a -> b");
    }

    #[test]
    fn feedback_cycle_is_accepted() {
        let mut f = Fixture::new();
        let a = f.add("a", passthrough);
        let b = f.add("b", passthrough);
        f.graph.add_edge(Edge::new(a, "out", b, "in"));
        f.graph.add_edge(Edge::new(b, "out", a, "in").feedback());
        assert!(f.validate().is_empty());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut f = Fixture::new();
        let a = f.add("a", passthrough);
        f.graph.add_edge(Edge::new(a, "out", a, "in"));
        let errors = f.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::IllegalCycle);
    }

    #[test]
    fn repeated_input_needs_a_producer() {
        let mut f = Fixture::new();
        f.add("sum", |s| {
            s.repeated_input::<i32>("values");
        });
        let errors = f.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ValidationErrorKind::UnboundInput);
        assert_eq!(errors[0].location, "sum.values");
    }
}
