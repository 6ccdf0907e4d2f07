//! The flow graph and its validation.
//!
//! - [`FlowGraph`] - operators and the edges between their ports
//! - [`validate`] - connectivity and cycle checks run before scheduling

mod flow_graph;
mod validator;

pub use flow_graph::{Edge, FlowGraph, GraphNode};
pub use validator::{NodeContract, validate};
