//! Convenient re-exports for implementing operators.
//!
//! ```
//! use sluice_core::prelude::*;
//! ```

pub use crate::condition::{
    BooleanCondition, Condition, CountCondition, DownstreamAffordable, MessageAvailable,
    PeriodicCondition, Readiness, ReadinessView,
};
pub use crate::config::Config;
pub use crate::context::{ExecutionContext, InputContext, OutputContext};
pub use crate::error::{Result, SluiceError};
pub use crate::message::Message;
pub use crate::operator::{LifecyclePhase, LifecycleState, Operator};
pub use crate::parameter::{Arg, ArgList, Parameters};
pub use crate::port::{ConditionPolicy, PortDirection};
pub use crate::registry::{Extension, Registry};
pub use crate::resource::{BlockMemoryPool, Resource};
pub use crate::shutdown::ShutdownHandle;
pub use crate::spec::OperatorSpec;
pub use crate::types::{RunId, TypeTag};
pub use crate::value::Value;
