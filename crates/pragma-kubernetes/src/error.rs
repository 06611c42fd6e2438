//! Kubernetes provider error types

use pragma_core::{ExternalError, ResourceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KubeError {
    #[error("kubectl not found. Please install kubectl and gke-gcloud-auth-plugin")]
    KubectlNotFound,

    #[error("kubectl {command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("Unexpected kubectl output: {0}")]
    InvalidOutput(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl KubeError {
    /// Classify a failed kubectl invocation by its stderr
    pub fn from_stderr(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        if stderr.contains("(NotFound)") {
            KubeError::NotFound(stderr.trim().to_string())
        } else if stderr.contains("(AlreadyExists)") {
            KubeError::AlreadyExists(stderr.trim().to_string())
        } else {
            KubeError::CommandFailed {
                command: command.into(),
                stderr: stderr.trim().to_string(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound(_))
    }
}

impl From<KubeError> for ResourceError {
    fn from(err: KubeError) -> Self {
        match err {
            KubeError::NotFound(msg) => ExternalError::not_found(msg).into(),
            KubeError::AlreadyExists(msg) => ExternalError::already_exists(msg).into(),
            KubeError::Resource(inner) => inner,
            other => ExternalError::other(other.to_string()).into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KubeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_classification() {
        let err = KubeError::from_stderr(
            "get",
            "Error from server (NotFound): deployments.apps \"web\" not found\n",
        );
        assert!(err.is_not_found());

        let err = KubeError::from_stderr(
            "create",
            "Error from server (AlreadyExists): namespaces \"apps\" already exists",
        );
        assert!(matches!(err, KubeError::AlreadyExists(_)));

        let err = KubeError::from_stderr("apply", "error: unable to recognize \"STDIN\"");
        assert!(matches!(err, KubeError::CommandFailed { ref command, .. } if command == "apply"));
    }

    #[test]
    fn test_conversion_keeps_not_found() {
        let err: ResourceError = KubeError::NotFound("pod".into()).into();
        assert!(err.is_not_found());

        let err: ResourceError = KubeError::KubectlNotFound.into();
        assert!(!err.is_not_found());
    }
}
