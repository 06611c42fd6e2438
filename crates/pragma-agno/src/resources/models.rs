//! Chat model resources (`agno/models/openai`, `agno/models/anthropic`)
//!
//! Both kinds compile to the same [`ModelSpec`] union, so agents and teams
//! can depend on either through a single `Dependency<ModelOutputs>`.

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::runtime::ChatModel;
use pragma_core::{Config, ResolutionContext, ResourceError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelSpec {
    OpenAI(OpenAIModelConfig),
    Anthropic(AnthropicModelConfig),
}

impl ModelSpec {
    pub fn id(&self) -> &str {
        match self {
            ModelSpec::OpenAI(m) => &m.id,
            ModelSpec::Anthropic(m) => &m.id,
        }
    }
}

pub type ModelOutputs = SpecOutputs<ModelSpec>;

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ResourceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn check_range(field: &str, value: Option<f64>, max: f64) -> Result<()> {
    match value {
        Some(v) if !(0.0..=max).contains(&v) => Err(ResourceError::Validation(format!(
            "{field} must be between 0.0 and {max:.1}, got {v}"
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAIModelConfig {
    pub id: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    /// For OpenAI-compatible APIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Config for OpenAIModelConfig {
    fn validate(&self) -> Result<()> {
        require("id", &self.id)?;
        require("api_key", &self.api_key)?;
        check_range("temperature", self.temperature, 2.0)?;
        check_range("top_p", self.top_p, 1.0)
    }
}

impl Definition for OpenAIModelConfig {
    const RESOURCE: &'static str = "models/openai";

    type Spec = ModelSpec;
    type Runtime = ChatModel;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<ModelSpec> {
        Ok(ModelSpec::OpenAI(self.clone()))
    }

    fn runtime(spec: &ModelSpec) -> Result<ChatModel> {
        Ok(ChatModel::from_spec(spec))
    }
}

pub type OpenAIModel = SpecResource<OpenAIModelConfig>;

fn default_max_tokens() -> u32 {
    8192
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnthropicModelConfig {
    pub id: String,
    pub api_key: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
}

impl Config for AnthropicModelConfig {
    fn validate(&self) -> Result<()> {
        require("id", &self.id)?;
        require("api_key", &self.api_key)?;
        if self.max_tokens == 0 {
            return Err(ResourceError::Validation(
                "max_tokens must be positive".into(),
            ));
        }
        check_range("temperature", self.temperature, 1.0)?;
        check_range("top_p", self.top_p, 1.0)
    }
}

impl Definition for AnthropicModelConfig {
    const RESOURCE: &'static str = "models/anthropic";

    type Spec = ModelSpec;
    type Runtime = ChatModel;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<ModelSpec> {
        Ok(ModelSpec::Anthropic(self.clone()))
    }

    fn runtime(spec: &ModelSpec) -> Result<ChatModel> {
        Ok(ChatModel::from_spec(spec))
    }
}

pub type AnthropicModel = SpecResource<AnthropicModelConfig>;
