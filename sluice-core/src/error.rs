//! Error types for sluice.
//!
//! Every error names the operator (and port or parameter, where relevant) it
//! concerns, so that a failed run can be traced back to a single wiring call
//! or lifecycle phase.

use crate::operator::{LifecyclePhase, LifecycleState};
use crate::port::PortDirection;
use crate::validation::{ValidationError, join_errors};
use thiserror::Error;

/// The main error type for sluice operations.
#[derive(Error, Debug)]
pub enum SluiceError {
    // =========================================================================
    // Graph / Wiring Errors (E100-E199)
    // =========================================================================
    /// The graph failed validation. Carries every defect found, not just the first.
    #[error("E101: Graph validation failed with {} error(s): {}", errors.len(), join_errors(errors))]
    GraphValidation {
        /// All defects found.
        errors: Vec<ValidationError>,
    },

    /// Port pairing was omitted but an operator has several candidate ports.
    #[error(
        "E102: Operator '{operator}' has more than one {direction} port ({}); the port pairing must be given explicitly",
        candidates.join(", ")
    )]
    AmbiguousPort {
        /// The operator with several candidate ports.
        operator: String,
        /// Which side of the flow was ambiguous.
        direction: PortDirection,
        /// The candidate port names.
        candidates: Vec<String>,
    },

    /// A named port does not exist on the operator.
    #[error(
        "E103: Operator '{operator}' has no {direction} port '{port}'; it should be one of ({})",
        available.join(", ")
    )]
    UnknownPort {
        /// The operator that was searched.
        operator: String,
        /// The requested port name.
        port: String,
        /// The direction searched.
        direction: PortDirection,
        /// The ports that do exist.
        available: Vec<String>,
    },

    /// A payload type does not match the port's declared type.
    #[error("E104: Type mismatch at {location}: expected {expected}, got {actual}")]
    PortTypeMismatch {
        /// Where the mismatch was detected (e.g., "producer.out -> consumer.in").
        location: String,
        /// The declared type.
        expected: String,
        /// The offered type.
        actual: String,
    },

    /// An operator name is already taken in the fragment.
    #[error("E105: Operator '{name}' is already declared in this fragment")]
    DuplicateOperator {
        /// The duplicated name.
        name: String,
    },

    /// No operator with this name or handle exists.
    #[error("E106: Operator '{name}' not found")]
    OperatorNotFound {
        /// The requested name.
        name: String,
    },

    /// A port pairing is inconsistent with the operator's ports.
    #[error("E107: Invalid port pairing for operator '{operator}': {cause}")]
    PortPairing {
        /// The operator whose ports were paired.
        operator: String,
        /// Description of the inconsistency.
        cause: String,
    },

    // =========================================================================
    // Parameter Errors (E200-E299)
    // =========================================================================
    /// A required parameter has no explicit value, configuration value or default.
    #[error("E201: Operator '{operator}' is missing required parameter '{parameter}'")]
    MissingParameter {
        /// The operator declaring the parameter.
        operator: String,
        /// The parameter name.
        parameter: String,
    },

    /// A parameter value could not be converted to the declared type.
    #[error(
        "E202: Parameter '{parameter}' of operator '{operator}' expects {expected}: {cause}"
    )]
    ParameterType {
        /// The operator declaring the parameter.
        operator: String,
        /// The parameter name.
        parameter: String,
        /// The declared type name.
        expected: String,
        /// Conversion failure detail.
        cause: String,
    },

    // =========================================================================
    // Operator Lifecycle Errors (E300-E399)
    // =========================================================================
    /// An operator failed inside one of its lifecycle phases.
    #[error("E301: Operator '{operator}' failed in {phase}: {cause}")]
    OperatorLifecycle {
        /// The phase that failed.
        phase: LifecyclePhase,
        /// The failing operator.
        operator: String,
        /// Reason for the failure.
        cause: String,
    },

    /// A lifecycle transition was attempted out of order.
    #[error("E302: Operator '{operator}' cannot move from {from} to {to}")]
    InvalidTransition {
        /// The operator.
        operator: String,
        /// Current state.
        from: LifecycleState,
        /// Requested state.
        to: LifecycleState,
    },

    /// A fragment was asked to run a second time.
    #[error("E303: Fragment '{fragment}' has already run")]
    AlreadyRan {
        /// The fragment name.
        fragment: String,
    },

    /// Failure raised by operator code.
    #[error("E399: {message}")]
    Operator {
        /// The operator-supplied message.
        message: String,
    },

    // =========================================================================
    // Runtime / Delivery Errors (E400-E499)
    // =========================================================================
    /// A port's capacity was exceeded.
    #[error("E401: Capacity of {port} on operator '{operator}' exceeded ({capacity})")]
    CapacityExceeded {
        /// The operator owning the port.
        operator: String,
        /// The port, or the edge for routing failures.
        port: String,
        /// The declared capacity.
        capacity: usize,
    },

    /// No message was available on the port.
    #[error("E402: No message available on port '{port}' of operator '{operator}'")]
    ReceiveNotReady {
        /// The receiving operator.
        operator: String,
        /// The port that was empty.
        port: String,
    },

    /// A resource was requested that the fragment does not own.
    #[error("E403: Resource '{resource}' requested by operator '{operator}' not found")]
    ResourceNotFound {
        /// The requesting operator.
        operator: String,
        /// The resource name.
        resource: String,
    },

    // =========================================================================
    // Configuration / Registry Errors (E500-E599)
    // =========================================================================
    /// The configuration document could not be read or interpreted.
    #[error("E501: Configuration error: {cause}")]
    Config {
        /// Description of the problem.
        cause: String,
    },

    /// An extension named in the configuration is not registered.
    #[error("E502: Unknown extension '{name}'")]
    UnknownExtension {
        /// The extension name.
        name: String,
    },

    /// No factory is registered for the operator type.
    #[error("E503: No operator factory registered for type '{type_name}'")]
    UnknownOperatorType {
        /// The requested type name.
        type_name: String,
    },
}

impl SluiceError {
    /// Create an operator-level failure from a message.
    ///
    /// This is the error operators return from `tick` and friends; the
    /// executor wraps it into [`SluiceError::OperatorLifecycle`] with the phase
    /// and operator name.
    pub fn operator(message: impl Into<String>) -> Self {
        Self::Operator {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(cause: impl Into<String>) -> Self {
        Self::Config {
            cause: cause.into(),
        }
    }

    /// Whether this error belongs to the parameter family.
    pub fn is_parameter_error(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. } | Self::ParameterType { .. }
        )
    }

    /// Whether this error only signals an empty port.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::ReceiveNotReady { .. })
    }
}

/// Result type alias for sluice operations.
pub type Result<T> = std::result::Result<T, SluiceError>;
