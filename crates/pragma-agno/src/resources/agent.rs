//! Agent definition (`agno/agent`)
//!
//! Pure configuration: the compiled [`AgentSpec`] nests the model, prompt,
//! knowledge and tool specs so a runner can rebuild the agent on its own.

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::resources::knowledge::{KnowledgeOutputs, KnowledgeSpec};
use crate::resources::models::{ModelOutputs, ModelSpec};
use crate::resources::prompt::{PromptConfig, PromptOutputs};
use crate::resources::tools::{ToolOutputs, ToolSpec};
use crate::runtime;
use pragma_core::{Config, Dependency, DependencySet, ResolutionContext, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub model: Dependency<ModelOutputs>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    /// Takes precedence over `instructions` when set
    #[serde(default)]
    pub prompt: Option<Dependency<PromptOutputs>>,
    #[serde(default)]
    pub knowledge: Vec<Dependency<KnowledgeOutputs>>,
    #[serde(default)]
    pub tools: Vec<Dependency<ToolOutputs>>,
    #[serde(default)]
    pub markdown: bool,
}

impl Config for AgentConfig {
    fn dependencies(&self) -> DependencySet {
        DependencySet::new()
            .required("model", &self.model)
            .optional("prompt", self.prompt.as_ref())
            .list("knowledge", &self.knowledge)
            .list("tools", &self.tools)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub model_spec: ModelSpec,
    #[serde(default)]
    pub knowledge_specs: Vec<KnowledgeSpec>,
    #[serde(default)]
    pub tools_specs: Vec<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_spec: Option<PromptConfig>,
    #[serde(default)]
    pub markdown: bool,
}

impl Definition for AgentConfig {
    const RESOURCE: &'static str = "agent";

    type Spec = AgentSpec;
    type Runtime = runtime::Agent;

    fn build_spec(&self, name: &str, ctx: &ResolutionContext) -> Result<AgentSpec> {
        let model = ctx.resolved(&self.model)?;
        let prompt = ctx.resolved_optional(self.prompt.as_ref())?;
        let knowledge = ctx.resolved_list(&self.knowledge)?;
        let tools = ctx.resolved_list(&self.tools)?;

        Ok(AgentSpec {
            name: name.to_string(),
            description: self.description.clone(),
            instructions: self.instructions.clone(),
            model_spec: model.spec,
            knowledge_specs: knowledge.into_iter().map(|k| k.spec).collect(),
            tools_specs: tools.into_iter().map(|t| t.spec).collect(),
            prompt_spec: prompt.map(|p| p.spec),
            markdown: self.markdown,
        })
    }

    fn runtime(spec: &AgentSpec) -> Result<runtime::Agent> {
        Ok(runtime::Agent::from_spec(spec)?)
    }
}

pub type AgentOutputs = SpecOutputs<AgentSpec>;
pub type Agent = SpecResource<AgentConfig>;
