//! Port declarations.

use crate::types::TypeTag;
use std::fmt;

/// Which side of an operator a port is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// Receives messages.
    Input,
    /// Emits messages.
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Whether an input port is a single receiver or a growable set of receivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortKind {
    /// Exactly one producer may connect.
    #[default]
    Single,
    /// Each connecting producer gets its own synthesized receiver (`name:0`, `name:1`, ...).
    Repeated,
}

/// Whether the executor attaches its default readiness condition to a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionPolicy {
    /// Attach MessageAvailable to inputs and DownstreamAffordable to outputs.
    #[default]
    Default,
    /// Attach nothing; the operator gates itself.
    None,
}

/// Declaration of a single port.
#[derive(Debug, Clone)]
pub struct PortSpec {
    /// Port name, unique per direction within an operator.
    pub name: String,
    /// Input or output.
    pub direction: PortDirection,
    /// Payload type accepted or produced.
    pub tag: TypeTag,
    /// Optional inputs may stay unconnected.
    pub optional: bool,
    /// Queue capacity for inputs, messages per tick for outputs.
    pub capacity: usize,
    /// Messages required (inputs) or free slots required (outputs) for readiness.
    pub min_size: usize,
    /// Single or repeated receiver.
    pub kind: PortKind,
    /// Default condition attachment.
    pub policy: ConditionPolicy,
    /// For synthesized receivers, the repeated port they belong to.
    pub parent: Option<String>,
}

impl PortSpec {
    /// Create a port declaration.
    pub fn new(name: impl Into<String>, direction: PortDirection, tag: TypeTag) -> Self {
        Self {
            name: name.into(),
            direction,
            tag,
            optional: false,
            capacity: 1,
            min_size: 1,
            kind: PortKind::Single,
            policy: ConditionPolicy::Default,
            parent: None,
        }
    }

    /// Set the queue capacity (inputs) or per-tick emit capacity (outputs).
    pub fn capacity(&mut self, capacity: usize) -> &mut Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Mark the port as optional.
    pub fn optional(&mut self) -> &mut Self {
        self.optional = true;
        self
    }

    /// Set the readiness threshold.
    pub fn min_size(&mut self, min_size: usize) -> &mut Self {
        self.min_size = min_size.max(1);
        self
    }

    /// Set the default condition policy.
    pub fn condition_policy(&mut self, policy: ConditionPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Whether this is a repeated input declaration.
    pub fn is_repeated(&self) -> bool {
        self.kind == PortKind::Repeated
    }

    /// Whether this port was synthesized for a repeated input.
    pub fn is_synthesized(&self) -> bool {
        self.parent.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_setters() {
        let mut port = PortSpec::new("in", PortDirection::Input, TypeTag::of::<u8>());
        assert_eq!(port.capacity, 1);
        assert!(!port.optional);
        port.capacity(4).optional().condition_policy(ConditionPolicy::None);
        assert_eq!(port.capacity, 4);
        assert!(port.optional);
        assert_eq!(port.policy, ConditionPolicy::None);
    }
}
