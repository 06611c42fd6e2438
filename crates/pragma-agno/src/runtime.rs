//! Runtime object graph rebuilt from compiled specs
//!
//! Everything here is constructed from specs alone, bottom-up: models,
//! embedders and tools first, then knowledge bases, agents and teams. No
//! orchestrator or dependency is involved, which is what lets the runner
//! container rebuild an agent from `AGNO_SPEC_JSON`.
//!
//! Credentials are kept but never serialized, so a [`Deployed`] value can be
//! shown as-is.

use crate::error::{AgnoError, Result};
use crate::resources::agent::AgentSpec;
use crate::resources::knowledge::{EncodingFormat, KnowledgeSpec, OpenAIEmbedderConfig};
use crate::resources::models::ModelSpec;
use crate::resources::runner::DeployedSpec;
use crate::resources::team::TeamSpec;
use crate::resources::tools::{McpSpec, ToolSpec, Transport};
use crate::resources::vectordb::{QdrantSpec, SearchType};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

const OPENAI_API: &str = "https://api.openai.com/v1";
const ANTHROPIC_API: &str = "https://api.anthropic.com/v1";

fn set<T: Into<Value>>(params: &mut BTreeMap<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        params.insert(key.to_string(), value.into());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatModel {
    pub provider: String,
    pub id: String,
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: String,
    /// Request parameters that were explicitly set
    pub parameters: BTreeMap<String, Value>,
}

impl ChatModel {
    pub fn from_spec(spec: &ModelSpec) -> Self {
        let mut parameters = BTreeMap::new();
        match spec {
            ModelSpec::OpenAI(m) => {
                set(&mut parameters, "max_tokens", m.max_tokens);
                set(&mut parameters, "temperature", m.temperature);
                set(&mut parameters, "top_p", m.top_p);
                set(&mut parameters, "frequency_penalty", m.frequency_penalty);
                set(&mut parameters, "presence_penalty", m.presence_penalty);
                set(&mut parameters, "seed", m.seed);
                set(&mut parameters, "timeout", m.timeout);
                set(&mut parameters, "max_retries", m.max_retries);
                set(&mut parameters, "organization", m.organization.clone());
                if !m.stop.is_empty() {
                    parameters.insert("stop".into(), m.stop.clone().into());
                }
                Self {
                    provider: "openai".into(),
                    id: m.id.clone(),
                    endpoint: m.base_url.clone().unwrap_or_else(|| OPENAI_API.into()),
                    api_key: m.api_key.clone(),
                    parameters,
                }
            }
            ModelSpec::Anthropic(m) => {
                set(&mut parameters, "max_tokens", Some(m.max_tokens));
                set(&mut parameters, "temperature", m.temperature);
                set(&mut parameters, "top_p", m.top_p);
                set(&mut parameters, "top_k", m.top_k);
                if !m.stop_sequences.is_empty() {
                    parameters.insert("stop_sequences".into(), m.stop_sequences.clone().into());
                }
                Self {
                    provider: "anthropic".into(),
                    id: m.id.clone(),
                    endpoint: ANTHROPIC_API.into(),
                    api_key: m.api_key.clone(),
                    parameters,
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Embedder {
    pub id: String,
    pub endpoint: String,
    #[serde(skip)]
    pub api_key: String,
    pub dimensions: Option<u32>,
    pub encoding_format: EncodingFormat,
}

impl Embedder {
    pub fn from_spec(spec: &OpenAIEmbedderConfig) -> Self {
        Self {
            id: spec.id.clone(),
            endpoint: spec.base_url.clone().unwrap_or_else(|| OPENAI_API.into()),
            api_key: spec.api_key.clone(),
            dimensions: spec.dimensions,
            encoding_format: spec.encoding_format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStore {
    pub url: String,
    pub collection: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub search_type: SearchType,
    pub embedder: Option<Embedder>,
}

impl VectorStore {
    pub fn from_spec(spec: &QdrantSpec) -> Self {
        Self {
            url: spec.url.clone(),
            collection: spec.collection.clone(),
            api_key: spec.api_key.clone(),
            search_type: spec.search_type,
            embedder: spec.embedder_spec.as_ref().map(Embedder::from_spec),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Knowledge {
    pub name: String,
    pub max_results: u32,
    pub vector_db: VectorStore,
    /// The knowledge override, else the vector store's embedder
    pub embedder: Option<Embedder>,
}

impl Knowledge {
    pub fn from_spec(spec: &KnowledgeSpec) -> Self {
        let vector_db = VectorStore::from_spec(&spec.vector_db_spec);
        let embedder = spec
            .embedder_spec
            .as_ref()
            .map(Embedder::from_spec)
            .or_else(|| vector_db.embedder.clone());
        Self {
            name: spec.name.clone(),
            max_results: spec.max_results,
            vector_db,
            embedder,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum McpConnection {
    Stdio {
        command: String,
        args: Vec<String>,
        #[serde(skip)]
        env: BTreeMap<String, String>,
    },
    Remote {
        transport: Transport,
        url: String,
        #[serde(skip)]
        headers: BTreeMap<String, String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct McpTool {
    pub connection: McpConnection,
    pub timeout_seconds: u32,
    pub forward_run_context: bool,
    pub include_tools: Option<Vec<String>>,
    pub exclude_tools: Option<Vec<String>>,
    pub tool_name_prefix: Option<String>,
}

impl McpTool {
    fn from_spec(spec: &McpSpec) -> Result<Self> {
        let connection = match spec.transport {
            Transport::Stdio => McpConnection::Stdio {
                command: spec.command.clone().ok_or_else(|| {
                    AgnoError::Runtime("stdio MCP tool has no command".into())
                })?,
                args: spec.args.clone(),
                env: spec.env.clone(),
            },
            transport => McpConnection::Remote {
                transport,
                url: spec
                    .url
                    .clone()
                    .ok_or_else(|| AgnoError::Runtime("remote MCP tool has no url".into()))?,
                headers: spec.headers.clone(),
            },
        };
        Ok(Self {
            connection,
            timeout_seconds: spec.timeout_seconds,
            forward_run_context: spec.include_run_context_headers,
            include_tools: spec.include_tools.clone(),
            exclude_tools: spec.exclude_tools.clone(),
            tool_name_prefix: spec.tool_name_prefix.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Tool {
    Mcp(McpTool),
    WebSearch {
        functions: Vec<String>,
        modifier: Option<String>,
        max_results: Option<u32>,
        timeout_seconds: u32,
    },
}

impl Tool {
    pub fn from_spec(spec: &ToolSpec) -> Result<Self> {
        match spec {
            ToolSpec::Mcp(mcp) => Ok(Tool::Mcp(McpTool::from_spec(mcp)?)),
            ToolSpec::WebSearch(search) => Ok(Tool::WebSearch {
                functions: search.functions().into_iter().map(String::from).collect(),
                modifier: search.modifier.clone(),
                max_results: search.fixed_max_results,
                timeout_seconds: search.timeout,
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Agent {
    pub name: String,
    pub description: Option<String>,
    pub model: ChatModel,
    pub instructions: Option<String>,
    pub knowledge: Option<Knowledge>,
    pub tools: Vec<Tool>,
    pub markdown: bool,
}

impl Agent {
    pub fn from_spec(spec: &AgentSpec) -> Result<Self> {
        if spec.knowledge_specs.len() > 1 {
            tracing::warn!(
                "Agent {} lists {} knowledge bases; only the first is attached",
                spec.name,
                spec.knowledge_specs.len()
            );
        }
        let tools = spec
            .tools_specs
            .iter()
            .map(Tool::from_spec)
            .collect::<Result<Vec<_>>>()?;
        let instructions = match &spec.prompt_spec {
            Some(prompt) => Some(prompt.render()),
            None => spec.instructions.clone(),
        };

        Ok(Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            model: ChatModel::from_spec(&spec.model_spec),
            instructions,
            knowledge: spec.knowledge_specs.first().map(Knowledge::from_spec),
            tools,
            markdown: spec.markdown,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Team {
    pub name: String,
    pub description: Option<String>,
    pub role: Option<String>,
    pub members: Vec<Agent>,
    pub model: Option<ChatModel>,
    pub instructions: Vec<String>,
    pub tools: Vec<Tool>,
    pub knowledge: Option<Knowledge>,
    pub respond_directly: bool,
    pub delegate_to_all_members: bool,
    pub markdown: bool,
}

impl Team {
    pub fn from_spec(spec: &TeamSpec) -> Result<Self> {
        if spec.member_specs.is_empty() {
            return Err(AgnoError::Runtime(format!(
                "team {} has no members",
                spec.name
            )));
        }
        let members = spec
            .member_specs
            .iter()
            .map(Agent::from_spec)
            .collect::<Result<Vec<_>>>()?;
        let tools = spec
            .tools_specs
            .iter()
            .map(Tool::from_spec)
            .collect::<Result<Vec<_>>>()?;

        let mut instructions = spec.instructions.clone();
        if let Some(prompt) = &spec.prompt_spec {
            instructions.push(prompt.render());
        }

        Ok(Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
            role: spec.role.clone(),
            members,
            model: spec.model_spec.as_ref().map(ChatModel::from_spec),
            instructions,
            tools,
            knowledge: spec.knowledge_spec.as_ref().map(Knowledge::from_spec),
            respond_directly: spec.respond_directly,
            delegate_to_all_members: spec.delegate_to_all_members,
            markdown: spec.markdown,
        })
    }
}

/// What a runner container serves
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "graph", rename_all = "lowercase")]
pub enum Deployed {
    Agent(Agent),
    Team(Team),
}

impl Deployed {
    pub fn from_spec(spec: &DeployedSpec) -> Result<Self> {
        match spec {
            DeployedSpec::Agent(agent) => Ok(Deployed::Agent(Agent::from_spec(agent)?)),
            DeployedSpec::Team(team) => Ok(Deployed::Team(Team::from_spec(team)?)),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Deployed::Agent(agent) => &agent.name,
            Deployed::Team(team) => &team.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::prompt::PromptConfig;
    use serde_json::json;

    fn openai() -> ModelSpec {
        serde_json::from_value(json!({
            "type": "openai",
            "id": "gpt-4o",
            "api_key": "sk-secret",
            "temperature": 0.2
        }))
        .unwrap()
    }

    fn agent_spec() -> AgentSpec {
        AgentSpec {
            name: "support".into(),
            description: None,
            instructions: Some("fallback".into()),
            model_spec: openai(),
            knowledge_specs: Vec::new(),
            tools_specs: Vec::new(),
            prompt_spec: None,
            markdown: false,
        }
    }

    #[test]
    fn test_model_keeps_only_set_parameters() {
        let model = ChatModel::from_spec(&openai());
        assert_eq!(model.endpoint, OPENAI_API);
        assert_eq!(model.parameters.len(), 1);
        assert_eq!(model.parameters["temperature"], 0.2);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let model = ChatModel::from_spec(&openai());
        let shown = serde_json::to_string(&model).unwrap();
        assert!(!shown.contains("sk-secret"));
    }

    #[test]
    fn test_prompt_overrides_instructions() {
        let mut spec = agent_spec();
        spec.prompt_spec = Some(PromptConfig {
            instructions: vec!["Answer billing questions.".into()],
            ..Default::default()
        });
        let agent = Agent::from_spec(&spec).unwrap();
        assert_eq!(agent.instructions.as_deref(), Some("Answer billing questions."));
    }

    #[test]
    fn test_knowledge_falls_back_to_vector_db_embedder() {
        let spec: KnowledgeSpec = serde_json::from_value(json!({
            "name": "docs",
            "max_results": 5,
            "vector_db_spec": {
                "url": "http://qdrant:6333",
                "collection": "docs",
                "search_type": "hybrid",
                "embedder_spec": {"id": "text-embedding-3-large", "api_key": "k"}
            }
        }))
        .unwrap();
        let knowledge = Knowledge::from_spec(&spec);
        assert_eq!(knowledge.embedder.unwrap().id, "text-embedding-3-large");
    }

    #[test]
    fn test_team_without_members_rejected() {
        let spec: TeamSpec =
            serde_json::from_value(json!({"name": "empty", "member_specs": []})).unwrap();
        assert!(matches!(Team::from_spec(&spec), Err(AgnoError::Runtime(_))));
    }
}
