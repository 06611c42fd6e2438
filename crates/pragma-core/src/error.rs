use thiserror::Error;

/// Coarse classification of a failed control-plane call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalErrorKind {
    NotFound,
    AlreadyExists,
    Other,
}

/// Failure reported by an external control plane.
///
/// Only the kind is inspected by lifecycle code; the message is for humans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ExternalError {
    pub kind: ExternalErrorKind,
    pub message: String,
}

impl ExternalError {
    pub fn new(kind: ExternalErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ExternalErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ExternalErrorKind::AlreadyExists, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ExternalErrorKind::Other, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ExternalErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == ExternalErrorKind::AlreadyExists
    }
}

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Invalid configuration: {0}")]
    Validation(String),

    #[error("Cannot change {field}; delete and recreate resource")]
    ImmutableField { field: String },

    #[error("External call failed: {0}")]
    External(#[from] ExternalError),

    #[error("{resource} did not converge after {attempts} attempts")]
    ConvergenceTimeout { resource: String, attempts: u32 },

    #[error("{resource} entered terminal state {status}")]
    ConvergenceFailure { resource: String, status: String },

    #[error("Waiting for {resource} was cancelled")]
    Cancelled { resource: String },

    #[error("Dependency {id} has not been resolved in this pass")]
    UnresolvedDependency { id: String },

    #[error("Dependency {id} does not exist or has no outputs")]
    DependencyNotFound { id: String },

    #[error("Dependency cycle: {path}")]
    DependencyCycle { path: String },

    #[error("Cannot {operation} a resource in state {state}")]
    InvalidTransition { operation: String, state: String },

    #[error("Spec error: {0}")]
    Spec(String),

    #[error("State error: {0}")]
    State(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ResourceError {
    /// True when the error is an external not-found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::External(e) if e.is_not_found())
    }

    /// True when the error is an external already-exists response
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ResourceError::External(e) if e.is_already_exists())
    }
}

pub type Result<T> = std::result::Result<T, ResourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_immutable_field_message() {
        let err = ResourceError::ImmutableField {
            field: "region".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot change region; delete and recreate resource"
        );
    }

    #[test]
    fn test_external_kind_helpers() {
        let err: ResourceError = ExternalError::not_found("cluster gone").into();
        assert!(err.is_not_found());
        assert!(!err.is_already_exists());

        let err: ResourceError = ExternalError::already_exists("exists").into();
        assert!(err.is_already_exists());

        assert!(!ResourceError::Validation("x".into()).is_not_found());
    }
}
