//! Core types for sluice.
//!
//! - `RunId`: Unique identifier for one scheduler run
//! - `OperatorId`: Declaration-ordered identifier of an operator
//! - `PortId`: Operator-qualified port name
//! - `TypeTag`: Static payload type tag checked at wiring, emit and receive time

mod ids;
mod tag;

pub use ids::{OperatorId, PortId, RunId};
pub use tag::TypeTag;
