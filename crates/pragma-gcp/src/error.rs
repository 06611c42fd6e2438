//! GCP provider error types

use pragma_core::{ExternalError, ResourceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GcpError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("GCP API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl GcpError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, GcpError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, GcpError::AlreadyExists(_))
    }
}

impl From<GcpError> for ResourceError {
    fn from(err: GcpError) -> Self {
        match err {
            GcpError::NotFound(msg) => ExternalError::not_found(msg).into(),
            GcpError::AlreadyExists(msg) => ExternalError::already_exists(msg).into(),
            GcpError::Resource(inner) => inner,
            other => ExternalError::other(other.to_string()).into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GcpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_keeps_kind() {
        let err: ResourceError = GcpError::NotFound("cluster".into()).into();
        assert!(err.is_not_found());

        let err: ResourceError = GcpError::AlreadyExists("cluster".into()).into();
        assert!(err.is_already_exists());

        let err: ResourceError = GcpError::Api {
            status: 403,
            message: "denied".into(),
        }
        .into();
        assert!(matches!(err, ResourceError::External(e) if e.message.contains("403")));
    }
}
