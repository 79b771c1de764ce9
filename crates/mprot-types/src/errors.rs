//! Error types for the management layer

use crate::InstanceId;

/// Errors raised while building protocols or enacting management actions.
///
/// Every variant is local and recoverable by the caller: the action that
/// raised it leaves the application as it was, except where noted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManagementError {
    #[error("Node unknown: {0}")]
    NodeUnknown(String),

    #[error("Instance unknown: {0}")]
    InstanceUnknown(InstanceId),

    #[error("Instance ID already used: {0}")]
    AlreadyUsedId(InstanceId),

    #[error("Operation '{operation}' not available for instance {instance} in state {state}")]
    OperationNotAvailable {
        instance: InstanceId,
        operation: String,
        state: String,
    },

    #[error("Rule not applicable: {0}")]
    RuleNotApplicable(String),

    #[error("Instance {instance} cannot satisfy requirement '{requirement}'")]
    InstanceNotAvailable {
        instance: InstanceId,
        requirement: String,
    },

    /// Raised by `op_end`. The instance is left broken.
    #[error("Operation '{operation}' failed on instance {instance}: requirement '{requirement}' unsatisfiable")]
    FailedOperation {
        instance: InstanceId,
        operation: String,
        requirement: String,
    },

    #[error("Operation '{operation}' cannot start on instance {instance}: requirement '{requirement}' unsatisfiable")]
    OperationNotStartable {
        instance: InstanceId,
        operation: String,
        requirement: String,
    },
}

impl ManagementError {
    pub(crate) fn rule(message: impl Into<String>) -> Self {
        Self::RuleNotApplicable(message.into())
    }
}

/// Result type alias for management operations
pub type ManagementResult<T> = Result<T, ManagementError>;

/// Errors raised when a plan step is malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("{variant} element has an empty '{field}'")]
    EmptyField {
        variant: &'static str,
        field: &'static str,
    },
}

/// Result type alias for plan construction
pub type PlanResult<T> = Result<T, PlanError>;
