//! Agno agent resources
//!
//! Models, prompts, knowledge, tools, agents and teams are pure definitions:
//! creating one compiles a serializable spec from its config and the specs of
//! its dependencies. A [`Runner`] deploys a compiled agent or team onto a GKE
//! cluster, where the runner process rebuilds it with [`Deployed::from_spec`].

pub mod error;
pub mod resource;
pub mod resources;
pub mod runtime;

pub use error::{AgnoError, Result};
pub use resource::{Definition, SpecOutputs, SpecResource};
pub use resources::agent::{Agent, AgentConfig, AgentOutputs, AgentSpec};
pub use resources::knowledge::{
    EmbedderOpenAI, EmbedderOutputs, Knowledge, KnowledgeConfig, KnowledgeOutputs, KnowledgeSpec,
    OpenAIEmbedderConfig,
};
pub use resources::models::{
    AnthropicModel, AnthropicModelConfig, ModelOutputs, ModelSpec, OpenAIModel, OpenAIModelConfig,
};
pub use resources::prompt::{Prompt, PromptConfig, PromptOutputs};
pub use resources::runner::{DeployedSpec, Runner, RunnerConfig, RunnerOutputs, RunnerSpec};
pub use resources::team::{Team, TeamConfig, TeamOutputs, TeamSpec};
pub use resources::tools::{McpConfig, ToolOutputs, ToolSpec, ToolsMcp, ToolsWebSearch, WebSearchConfig};
pub use resources::vectordb::{QdrantConfig, QdrantSpec, VectorDbOutputs, VectordbQdrant};
pub use runtime::Deployed;
