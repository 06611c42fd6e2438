//! Knowledge bases and their embedders
//! (`agno/knowledge`, `agno/knowledge/embedder/openai`)

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::resources::vectordb::{QdrantSpec, VectorDbOutputs};
use crate::runtime::{self, Embedder};
use pragma_core::{Config, Dependency, DependencySet, ResolutionContext, ResourceError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    #[default]
    Float,
    Base64,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIEmbedderConfig {
    #[serde(default = "default_embedding_model")]
    pub id: String,
    pub api_key: String,
    /// Only honoured by the text-embedding-3 family
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    #[serde(default)]
    pub encoding_format: EncodingFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config for OpenAIEmbedderConfig {
    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ResourceError::Validation(
                "api_key must not be empty".into(),
            ));
        }
        if self.dimensions.is_some() && !self.id.starts_with("text-embedding-3") {
            return Err(ResourceError::Validation(format!(
                "dimensions is not supported by embedding model '{}'",
                self.id
            )));
        }
        Ok(())
    }
}

impl Definition for OpenAIEmbedderConfig {
    const RESOURCE: &'static str = "knowledge/embedder/openai";

    type Spec = OpenAIEmbedderConfig;
    type Runtime = Embedder;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<OpenAIEmbedderConfig> {
        Ok(self.clone())
    }

    fn runtime(spec: &OpenAIEmbedderConfig) -> Result<Embedder> {
        Ok(Embedder::from_spec(spec))
    }
}

pub type EmbedderOutputs = SpecOutputs<OpenAIEmbedderConfig>;
pub type EmbedderOpenAI = SpecResource<OpenAIEmbedderConfig>;

fn default_max_results() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    pub vector_db: Dependency<VectorDbOutputs>,
    /// Overrides the vector store's own embedder
    #[serde(default)]
    pub embedder: Option<Dependency<EmbedderOutputs>>,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Config for KnowledgeConfig {
    fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(ResourceError::Validation(
                "max_results must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new()
            .required("vector_db", &self.vector_db)
            .optional("embedder", self.embedder.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSpec {
    pub name: String,
    pub max_results: u32,
    pub vector_db_spec: QdrantSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedder_spec: Option<OpenAIEmbedderConfig>,
}

impl Definition for KnowledgeConfig {
    const RESOURCE: &'static str = "knowledge";

    type Spec = KnowledgeSpec;
    type Runtime = runtime::Knowledge;

    fn build_spec(&self, name: &str, ctx: &ResolutionContext) -> Result<KnowledgeSpec> {
        let vector_db = ctx.resolved(&self.vector_db)?;
        let embedder = ctx.resolved_optional(self.embedder.as_ref())?;
        Ok(KnowledgeSpec {
            name: name.to_string(),
            max_results: self.max_results,
            vector_db_spec: vector_db.spec,
            embedder_spec: embedder.map(|e| e.spec),
        })
    }

    fn runtime(spec: &KnowledgeSpec) -> Result<runtime::Knowledge> {
        Ok(runtime::Knowledge::from_spec(spec))
    }
}

pub type KnowledgeOutputs = SpecOutputs<KnowledgeSpec>;
pub type Knowledge = SpecResource<KnowledgeConfig>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedder_defaults() {
        let config: OpenAIEmbedderConfig = serde_json::from_value(json!({"api_key": "sk"})).unwrap();
        assert_eq!(config.id, "text-embedding-3-small");
        assert_eq!(config.encoding_format, EncodingFormat::Float);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_dimensions_need_v3_model() {
        let config: OpenAIEmbedderConfig = serde_json::from_value(json!({
            "id": "text-embedding-ada-002",
            "api_key": "sk",
            "dimensions": 256
        }))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_knowledge_needs_resolved_vector_db() {
        let config: KnowledgeConfig = serde_json::from_value(json!({
            "vector_db": "agno/vectordb/qdrant/docs"
        }))
        .unwrap();
        assert_eq!(config.max_results, 10);

        let err = config
            .build_spec("docs", &ResolutionContext::detached())
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::UnresolvedDependency { id } if id == "agno/vectordb/qdrant/docs"
        ));
    }
}
