//! Team definition (`agno/team`)

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::resources::agent::{AgentOutputs, AgentSpec};
use crate::resources::knowledge::{KnowledgeOutputs, KnowledgeSpec};
use crate::resources::models::{ModelOutputs, ModelSpec};
use crate::resources::prompt::{PromptConfig, PromptOutputs};
use crate::resources::tools::{ToolOutputs, ToolSpec};
use crate::runtime;
use pragma_core::{Config, Dependency, DependencySet, ResolutionContext, ResourceError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamConfig {
    /// Display name; the resource name when unset
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub members: Vec<Dependency<AgentOutputs>>,
    /// Team leader model
    #[serde(default)]
    pub model: Option<Dependency<ModelOutputs>>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub prompt: Option<Dependency<PromptOutputs>>,
    #[serde(default)]
    pub tools: Vec<Dependency<ToolOutputs>>,
    #[serde(default)]
    pub knowledge: Option<Dependency<KnowledgeOutputs>>,
    #[serde(default)]
    pub respond_directly: bool,
    #[serde(default)]
    pub delegate_to_all_members: bool,
    #[serde(default)]
    pub markdown: bool,
}

impl Config for TeamConfig {
    fn validate(&self) -> Result<()> {
        if self.members.is_empty() {
            return Err(ResourceError::Validation(
                "Team must have at least one member".into(),
            ));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new()
            .list("members", &self.members)
            .optional("model", self.model.as_ref())
            .optional("prompt", self.prompt.as_ref())
            .list("tools", &self.tools)
            .optional("knowledge", self.knowledge.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub member_specs: Vec<AgentSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_spec: Option<ModelSpec>,
    #[serde(default)]
    pub tools_specs: Vec<ToolSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knowledge_spec: Option<KnowledgeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_spec: Option<PromptConfig>,
    #[serde(default)]
    pub respond_directly: bool,
    #[serde(default)]
    pub delegate_to_all_members: bool,
    #[serde(default)]
    pub markdown: bool,
}

impl Definition for TeamConfig {
    const RESOURCE: &'static str = "team";

    type Spec = TeamSpec;
    type Runtime = runtime::Team;

    fn build_spec(&self, name: &str, ctx: &ResolutionContext) -> Result<TeamSpec> {
        let members = ctx.resolved_list(&self.members)?;
        let model = ctx.resolved_optional(self.model.as_ref())?;
        let prompt = ctx.resolved_optional(self.prompt.as_ref())?;
        let tools = ctx.resolved_list(&self.tools)?;
        let knowledge = ctx.resolved_optional(self.knowledge.as_ref())?;

        Ok(TeamSpec {
            name: self.name.clone().unwrap_or_else(|| name.to_string()),
            description: self.description.clone(),
            role: self.role.clone(),
            instructions: self.instructions.clone(),
            member_specs: members.into_iter().map(|m| m.spec).collect(),
            model_spec: model.map(|m| m.spec),
            tools_specs: tools.into_iter().map(|t| t.spec).collect(),
            knowledge_spec: knowledge.map(|k| k.spec),
            prompt_spec: prompt.map(|p| p.spec),
            respond_directly: self.respond_directly,
            delegate_to_all_members: self.delegate_to_all_members,
            markdown: self.markdown,
        })
    }

    fn runtime(spec: &TeamSpec) -> Result<runtime::Team> {
        Ok(runtime::Team::from_spec(spec)?)
    }
}

pub type TeamOutputs = SpecOutputs<TeamSpec>;
pub type Team = SpecResource<TeamConfig>;
