//! Strongly-typed identifiers for sluice entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a single scheduler run of a fragment.
///
/// Every call to `run()` gets a fresh id, which is attached to the run's
/// tracing span so that log lines from concurrent fragments can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random run ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}", self.0)
    }
}

/// Identifier for an operator within a fragment.
///
/// Operator IDs are assigned in declaration order and double as the
/// scheduler's deterministic tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperatorId(u32);

impl OperatorId {
    /// Create a new operator ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw ID value.
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Get the ID as an index into declaration-ordered storage.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op_{}", self.0)
    }
}

impl From<u32> for OperatorId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Identifier for a port on an operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId {
    /// The operator this port belongs to.
    pub operator: OperatorId,
    /// The port name (e.g., "in", "out", "receivers:0").
    pub name: String,
}

impl PortId {
    /// Create a new port ID.
    #[must_use]
    pub fn new(operator: OperatorId, name: impl Into<String>) -> Self {
        Self {
            operator,
            name: name.into(),
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.operator, self.name)
    }
}
