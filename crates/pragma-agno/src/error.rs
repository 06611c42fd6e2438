//! Agno provider error types

use pragma_core::ResourceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgnoError {
    #[error("Unknown spec type '{0}': expected 'agent' or 'team'")]
    UnknownSpecType(String),

    #[error("Invalid {kind} spec: {source}")]
    InvalidSpec {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot build runtime: {0}")]
    Runtime(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

impl From<AgnoError> for ResourceError {
    fn from(err: AgnoError) -> Self {
        match err {
            AgnoError::Resource(inner) => inner,
            other => ResourceError::Spec(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AgnoError>;
