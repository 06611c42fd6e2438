//! Resource identity and the traits every config and outputs type implements

use crate::dependency::DependencySet;
use crate::error::{ResourceError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a resource: `provider/resource/name`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub provider: String,
    pub resource: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(
        provider: impl Into<String>,
        resource: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Canonical id used for caching and comparison
    pub fn id(&self) -> String {
        format!("{}/{}/{}", self.provider, self.resource, self.name)
    }

    /// Parse an id. The resource type may itself contain slashes
    /// (`agno/knowledge/embedder/openai/main`), so the provider is the
    /// first segment and the name is the last.
    pub fn parse(id: &str) -> Result<Self> {
        let parts: Vec<&str> = id.split('/').collect();
        if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(ResourceError::Validation(format!(
                "invalid resource id '{id}', expected provider/resource/name"
            )));
        }
        let provider = parts[0];
        let name = parts[parts.len() - 1];
        let resource = parts[1..parts.len() - 1].join("/");
        Ok(Self::new(provider, resource, name))
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.resource, self.name)
    }
}

/// Declared configuration of a resource.
///
/// Dependencies inside a config serialize as their ids, so the serialized
/// form compares by value fields plus dependency identities.
pub trait Config: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {
    /// Top-level fields that can never change after creation
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[];

    /// Field-level validation run before any lifecycle operation
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Dependency slots declared by this config
    fn dependencies(&self) -> DependencySet {
        DependencySet::new()
    }
}

/// Observed state produced by a successful create or update
pub trait Outputs: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {}

impl<T> Outputs for T where T: Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_id_and_display() {
        let key = ResourceKey::new("gcp", "gke", "primary");
        assert_eq!(key.id(), "gcp/gke/primary");
        assert_eq!(key.to_string(), key.id());
    }

    #[test]
    fn test_parse_nested_resource_type() {
        let key = ResourceKey::parse("agno/knowledge/embedder/openai/main").unwrap();
        assert_eq!(key.provider, "agno");
        assert_eq!(key.resource, "knowledge/embedder/openai");
        assert_eq!(key.name, "main");
    }

    #[test]
    fn test_parse_rejects_short_ids() {
        assert!(ResourceKey::parse("gcp/gke").is_err());
        assert!(ResourceKey::parse("gcp//x").is_err());
    }
}
