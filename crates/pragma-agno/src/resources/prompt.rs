//! Reusable prompt (`agno/prompt`)
//!
//! Instruction lines and an optional `{{variable}}` template. The config has
//! no dependencies, so it is its own spec; rendering happens at runtime.

use crate::resource::{Definition, SpecOutputs, SpecResource};
use pragma_core::{Config, ResolutionContext, ResourceError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const PLACEHOLDER: &str = r"\{\{(\w+)\}\}";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptConfig {
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    #[serde(default)]
    pub template: Option<String>,
}

impl PromptConfig {
    fn placeholders(template: &str) -> Result<BTreeSet<String>> {
        let re = Regex::new(PLACEHOLDER)
            .map_err(|e| ResourceError::Validation(format!("placeholder pattern: {e}")))?;
        Ok(re
            .captures_iter(template)
            .map(|c| c[1].to_string())
            .collect())
    }

    /// Instructions joined by newlines, followed by the interpolated template
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        if !self.instructions.is_empty() {
            parts.push(self.instructions.join("\n"));
        }
        if let Some(template) = &self.template {
            let mut rendered = template.clone();
            for (key, value) in &self.variables {
                rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
            }
            parts.push(rendered);
        }
        parts.join("\n")
    }
}

impl Config for PromptConfig {
    fn validate(&self) -> Result<()> {
        let template = self.template.as_deref().filter(|t| !t.is_empty());
        if self.instructions.is_empty() && template.is_none() {
            return Err(ResourceError::Validation(
                "At least one of 'instructions' or 'template' must be provided".into(),
            ));
        }

        if let Some(template) = template {
            let missing: Vec<String> = Self::placeholders(template)?
                .into_iter()
                .filter(|p| !self.variables.contains_key(p))
                .collect();
            if !missing.is_empty() {
                return Err(ResourceError::Validation(format!(
                    "Missing variables for template placeholders: {missing:?}"
                )));
            }
        }
        Ok(())
    }
}

impl Definition for PromptConfig {
    const RESOURCE: &'static str = "prompt";

    type Spec = PromptConfig;
    type Runtime = String;

    fn build_spec(&self, _name: &str, _ctx: &ResolutionContext) -> Result<PromptConfig> {
        Ok(self.clone())
    }

    fn runtime(spec: &PromptConfig) -> Result<String> {
        Ok(spec.render())
    }
}

pub type PromptOutputs = SpecOutputs<PromptConfig>;
pub type Prompt = SpecResource<PromptConfig>;
