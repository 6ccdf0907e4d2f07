//! Flow graph representation and ordering.

use sluice_core::error::{Result, SluiceError};
use sluice_core::types::OperatorId;
use sluice_core::validation::ValidationError;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A directed edge from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    /// Producer operator.
    pub from: OperatorId,
    /// Producer output port.
    pub from_port: String,
    /// Consumer operator.
    pub to: OperatorId,
    /// Consumer input port (synthesized name for repeated inputs).
    pub to_port: String,
    /// Feedback edges close a cycle and are ignored by cycle detection and ordering.
    pub feedback: bool,
}

impl Edge {
    /// Create a forward edge.
    pub fn new(
        from: OperatorId,
        from_port: impl Into<String>,
        to: OperatorId,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from,
            from_port: from_port.into(),
            to,
            to_port: to_port.into(),
            feedback: false,
        }
    }

    /// Mark the edge as feedback.
    pub fn feedback(mut self) -> Self {
        self.feedback = true;
        self
    }
}

/// An operator registered in the graph.
#[derive(Debug, Clone)]
pub struct GraphNode {
    /// Operator ID.
    pub id: OperatorId,
    /// Operator name, unique within the fragment.
    pub name: String,
}

/// Operators and flows of one fragment.
///
/// Node iteration is in [`OperatorId`] order, which is declaration order.
#[derive(Debug, Default)]
pub struct FlowGraph {
    nodes: BTreeMap<OperatorId, GraphNode>,
    edges: Vec<Edge>,
    outgoing: HashMap<OperatorId, Vec<usize>>,
    incoming: HashMap<OperatorId, Vec<usize>>,
}

impl FlowGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operator. Returns false if it was already present.
    pub fn add_operator(&mut self, id: OperatorId, name: impl Into<String>) -> bool {
        if self.nodes.contains_key(&id) {
            return false;
        }
        self.nodes.insert(
            id,
            GraphNode {
                id,
                name: name.into(),
            },
        );
        self.outgoing.entry(id).or_default();
        self.incoming.entry(id).or_default();
        true
    }

    /// Add an edge. Returns false if an identical edge already exists.
    pub fn add_edge(&mut self, edge: Edge) -> bool {
        if self.edges.contains(&edge) {
            return false;
        }
        let idx = self.edges.len();
        self.outgoing.entry(edge.from).or_default().push(idx);
        self.incoming.entry(edge.to).or_default().push(idx);
        self.edges.push(edge);
        true
    }

    /// Whether the operator is registered.
    pub fn contains(&self, id: OperatorId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Get a node by ID.
    pub fn node(&self, id: OperatorId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// All nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.values()
    }

    /// All node IDs in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = OperatorId> + '_ {
        self.nodes.keys().copied()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Number of operators.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no operators.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Edges leaving an operator, in insertion order.
    pub fn outgoing_edges(&self, id: OperatorId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    /// Edges entering an operator, in insertion order.
    pub fn incoming_edges(&self, id: OperatorId) -> impl Iterator<Item = &Edge> {
        self.incoming
            .get(&id)
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&i| &self.edges[i]))
    }

    /// Edges entering a specific input port.
    pub fn edges_into<'a>(&'a self, id: OperatorId, port: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.incoming_edges(id).filter(move |e| e.to_port == port)
    }

    /// Operators in an order consistent with the forward edges.
    ///
    /// Kahn's algorithm over non-feedback edges; among operators with no
    /// remaining predecessors the lowest ID comes first, so the order is
    /// deterministic.
    pub fn topological_order(&self) -> Result<Vec<OperatorId>> {
        let mut in_degree: BTreeMap<OperatorId, usize> =
            self.nodes.keys().map(|&id| (id, 0)).collect();
        for edge in self.edges.iter().filter(|e| !e.feedback) {
            if let Some(degree) = in_degree.get_mut(&edge.to) {
                *degree += 1;
            }
        }

        let mut ready: BTreeSet<OperatorId> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            sorted.push(id);
            for edge in self.outgoing_edges(id).filter(|e| !e.feedback) {
                if let Some(degree) = in_degree.get_mut(&edge.to) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(edge.to);
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            let members: Vec<String> = self
                .nodes
                .values()
                .filter(|n| !sorted.contains(&n.id))
                .map(|n| n.name.clone())
                .collect();
            return Err(SluiceError::GraphValidation {
                errors: vec![ValidationError::illegal_cycle(&members)],
            });
        }
        Ok(sorted)
    }
}
