//! Graph validation error types.

use std::fmt;

/// A single defect found while validating a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The type of defect.
    pub kind: ValidationErrorKind,
    /// Where the defect was found (e.g., "consumer.in").
    pub location: String,
    /// Human-readable description.
    pub message: String,
}

/// Types of graph defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required input port has no producer edge.
    UnboundInput,
    /// A single-receiver input port has more than one producer edge.
    FanIn,
    /// A cycle of edges none of which is marked as feedback.
    IllegalCycle,
    /// An edge references an operator or port that does not exist.
    InvalidReference,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UnboundInput => "UNBOUND_INPUT",
            Self::FanIn => "FAN_IN",
            Self::IllegalCycle => "ILLEGAL_CYCLE",
            Self::InvalidReference => "INVALID_REFERENCE",
        };
        f.write_str(s)
    }
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(
        kind: ValidationErrorKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location: location.into(),
            message: message.into(),
        }
    }

    /// Create an unbound input error.
    pub fn unbound_input(operator: &str, port: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnboundInput,
            format!("{}.{}", operator, port),
            format!("required input port '{}' has no producer", port),
        )
    }

    /// Create a fan-in error.
    pub fn fan_in(operator: &str, port: &str, producers: &[String]) -> Self {
        Self::new(
            ValidationErrorKind::FanIn,
            format!("{}.{}", operator, port),
            format!(
                "input port '{}' has {} producers ({}); only repeated input ports accept fan-in",
                port,
                producers.len(),
                producers.join(", ")
            ),
        )
    }

    /// Create an illegal cycle error.
    pub fn illegal_cycle(members: &[String]) -> Self {
        Self::new(
            ValidationErrorKind::IllegalCycle,
            members.join(" -> "),
            format!(
                "cycle through {} without a feedback edge",
                members.join(", ")
            ),
        )
    }

    /// Create an invalid reference error.
    pub fn invalid_reference(location: impl Into<String>, reference: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidReference,
            location,
            format!("reference to non-existent '{}'", reference),
        )
    }
}

pub(crate) fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_location() {
        let err = ValidationError::unbound_input("consumer", "in");
        assert_eq!(
            err.to_string(),
            "[UNBOUND_INPUT] consumer.in: required input port 'in' has no producer"
        );
    }

    #[test]
    fn fan_in_lists_producers() {
        let err = ValidationError::fan_in("sink", "in", &["a.out".into(), "b.out".into()]);
        assert_eq!(err.kind, ValidationErrorKind::FanIn);
        assert!(err.message.contains("a.out, b.out"));
    }
}
