//! Agent toolkits (`agno/tools/mcp`, `agno/tools/websearch`)

use crate::resource::{Definition, SpecOutputs, SpecResource};
use crate::runtime::Tool;
use pragma_core::{Config, ResolutionContext, ResourceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Either toolkit, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolSpec {
    Mcp(McpSpec),
    WebSearch(WebSearchConfig),
}

pub type ToolOutputs = SpecOutputs<ToolSpec>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transport {
    Stdio,
    Sse,
    StreamableHttp,
}

fn default_timeout_seconds() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// Server command line for stdio, split on whitespace
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Inferred when unset: stdio with a command, sse with a url
    #[serde(default)]
    pub transport: Option<Transport>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Forward X-User-ID, X-Session-ID and X-Run-ID from the run
    #[serde(default)]
    pub include_run_context_headers: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub include_tools: Option<Vec<String>>,
    #[serde(default)]
    pub exclude_tools: Option<Vec<String>>,
    #[serde(default)]
    pub tool_name_prefix: Option<String>,
}

impl McpConfig {
    fn transport(&self) -> Transport {
        match (self.transport, &self.command) {
            (Some(transport), _) => transport,
            (None, Some(_)) => Transport::Stdio,
            (None, None) => Transport::Sse,
        }
    }
}

impl Config for McpConfig {
    fn validate(&self) -> Result<()> {
        let has_command = self.command.is_some();
        let has_url = self.url.is_some();
        if !has_command && !has_url {
            return Err(ResourceError::Validation(
                "Either 'command' (for stdio) or 'url' (for sse/streamable-http) is required"
                    .into(),
            ));
        }
        if has_command && has_url {
            return Err(ResourceError::Validation(
                "Cannot specify both 'command' and 'url' - choose one transport".into(),
            ));
        }
        match self.transport {
            Some(Transport::Stdio) if !has_command => Err(ResourceError::Validation(
                "stdio transport requires 'command'".into(),
            )),
            Some(Transport::Sse) if !has_url => Err(ResourceError::Validation(
                "sse transport requires 'url'".into(),
            )),
            Some(Transport::StreamableHttp) if !has_url => Err(ResourceError::Validation(
                "streamable-http transport requires 'url'".into(),
            )),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpSpec {
    pub transport: Transport,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub include_run_context_headers: bool,
    pub timeout_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tools: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name_prefix: Option<String>,
}

impl Definition for McpConfig {
    const RESOURCE: &'static str = "tools/mcp";

    type Spec = ToolSpec;
    type Runtime = Tool;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<ToolSpec> {
        let mut parts = self
            .command
            .as_deref()
            .map(|c| c.split_whitespace().map(String::from).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        let command = parts.next();
        let args = parts.collect();

        Ok(ToolSpec::Mcp(McpSpec {
            transport: self.transport(),
            url: self.url.clone(),
            command,
            args,
            env: self.env.clone(),
            headers: self.headers.clone(),
            include_run_context_headers: self.include_run_context_headers,
            timeout_seconds: self.timeout_seconds,
            include_tools: self.include_tools.clone(),
            exclude_tools: self.exclude_tools.clone(),
            tool_name_prefix: self.tool_name_prefix.clone(),
        }))
    }

    fn runtime(spec: &ToolSpec) -> Result<Tool> {
        Ok(Tool::from_spec(spec)?)
    }
}

pub type ToolsMcp = SpecResource<McpConfig>;

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "enabled")]
    pub enable_search: bool,
    #[serde(default = "enabled")]
    pub enable_news: bool,
    /// Prepended to every query, e.g. `site:example.com`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_max_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout: u32,
    #[serde(default = "enabled")]
    pub verify_ssl: bool,
}

impl WebSearchConfig {
    pub fn functions(&self) -> Vec<&'static str> {
        let mut functions = Vec::new();
        if self.enable_search {
            functions.push("web_search");
        }
        if self.enable_news {
            functions.push("search_news");
        }
        functions
    }
}

impl Config for WebSearchConfig {
    fn validate(&self) -> Result<()> {
        if self.functions().is_empty() {
            return Err(ResourceError::Validation(
                "enable at least one of enable_search or enable_news".into(),
            ));
        }
        Ok(())
    }
}

impl Definition for WebSearchConfig {
    const RESOURCE: &'static str = "tools/websearch";

    type Spec = ToolSpec;
    type Runtime = Tool;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<ToolSpec> {
        Ok(ToolSpec::WebSearch(self.clone()))
    }

    fn runtime(spec: &ToolSpec) -> Result<Tool> {
        Ok(Tool::from_spec(spec)?)
    }
}

pub type ToolsWebSearch = SpecResource<WebSearchConfig>;
