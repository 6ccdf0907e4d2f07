//! Sluice Core Library
//!
//! Leaf types and contracts for the sluice dataflow runtime: messages and
//! their type tags, ports and bounded queues, readiness conditions,
//! parameters, the operator trait and its per-tick contexts, resources,
//! configuration documents and the converter/extension registry.
//!
//! Graph construction and scheduling live in `sluice-executor`.
//!
//! # Example
//!
//! ```
//! use sluice_core::prelude::*;
//!
//! struct Ping {
//!     count: i64,
//! }
//!
//! impl Operator for Ping {
//!     fn setup(&mut self, spec: &mut OperatorSpec) {
//!         spec.output::<i64>("out");
//!         spec.condition(CountCondition::new(3));
//!     }
//!
//!     fn tick(
//!         &mut self,
//!         _input: &mut InputContext,
//!         output: &mut OutputContext,
//!         _ctx: &ExecutionContext,
//!     ) -> Result<()> {
//!         self.count += 1;
//!         output.emit("out", self.count)
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod condition;
pub mod config;
pub mod context;
pub mod error;
pub mod message;
pub mod operator;
pub mod parameter;
pub mod port;
pub mod prelude;
pub mod queue;
pub mod registry;
pub mod resource;
pub mod shutdown;
pub mod spec;
pub mod types;
pub mod validation;
pub mod value;

pub use config::Config;
pub use error::{Result, SluiceError};
pub use message::Message;
pub use operator::{LifecyclePhase, LifecycleState, Operator};
pub use registry::Registry;
pub use spec::OperatorSpec;
pub use types::{OperatorId, PortId, RunId, TypeTag};
pub use value::Value;
