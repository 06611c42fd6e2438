//! Qdrant vector store (`agno/vectordb/qdrant`)

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::resources::knowledge::{EmbedderOutputs, OpenAIEmbedderConfig};
use crate::runtime::VectorStore;
use pragma_core::{Config, Dependency, DependencySet, ResolutionContext, ResourceError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Vector,
    Keyword,
    #[default]
    Hybrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    pub url: String,
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub embedder: Option<Dependency<EmbedderOutputs>>,
}

impl Config for QdrantConfig {
    fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ResourceError::Validation(format!(
                "url must be an http(s) URL, got '{}'",
                self.url
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(ResourceError::Validation(
                "collection must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().optional("embedder", self.embedder.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantSpec {
    pub url: String,
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub search_type: SearchType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedder_spec: Option<OpenAIEmbedderConfig>,
}

impl Definition for QdrantConfig {
    const RESOURCE: &'static str = "vectordb/qdrant";

    type Spec = QdrantSpec;
    type Runtime = VectorStore;

    fn build_spec(&self, _name: &str, ctx: &ResolutionContext) -> Result<QdrantSpec> {
        let embedder = ctx.resolved_optional(self.embedder.as_ref())?;
        Ok(QdrantSpec {
            url: self.url.clone(),
            collection: self.collection.clone(),
            api_key: self.api_key.clone(),
            search_type: self.search_type,
            embedder_spec: embedder.map(|e| e.spec),
        })
    }

    fn runtime(spec: &QdrantSpec) -> Result<VectorStore> {
        Ok(VectorStore::from_spec(spec))
    }
}

pub type VectorDbOutputs = SpecOutputs<QdrantSpec>;
pub type VectordbQdrant = SpecResource<QdrantConfig>;
