use crate::validation::ValidationReport;
use thiserror::Error;

/// Core error type for the certflow workflow core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Workflow definition not found
    #[error("Workflow definition not found: {0}")]
    DefinitionNotFound(String),

    /// Step not found in a definition or in the step provider
    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// Workflow instance not found
    #[error("Workflow instance not found: {0}")]
    InstanceNotFound(String),

    /// Submitted data failed one or more rules
    #[error("{0}")]
    ValidationFailed(ValidationReport),

    /// Submission targets a step other than the instance's current step
    #[error("Invalid step: {0}")]
    InvalidStep(String),

    /// Operation not allowed in the instance's current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Step definition is structurally malformed
    #[error("Malformed step definition: {0}")]
    MalformedStep(String),

    /// Stored instance changed since it was loaded
    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl CoreError {
    /// Whether this error is one of the not-found conditions
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::DefinitionNotFound(_)
                | CoreError::StepNotFound(_)
                | CoreError::InstanceNotFound(_)
        )
    }

    /// The validation report carried by a validation failure, if any
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            CoreError::ValidationFailed(report) => Some(report),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<String> for CoreError {
    fn from(err: String) -> Self {
        CoreError::Other(err)
    }
}

impl From<&str> for CoreError {
    fn from(err: &str) -> Self {
        CoreError::Other(err.to_string())
    }
}
