//! Field-level comparison of two configs

use crate::error::Result;
use crate::guard::to_object;
use crate::resource::Config;
use serde_json::Value;

/// What changed between a previous and a current config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    /// Plain fields whose values differ
    pub fields: Vec<String>,
    /// Dependency slots whose referenced ids differ
    pub dependencies: Vec<String>,
}

impl ConfigDiff {
    pub fn between<C: Config>(previous: &C, current: &C) -> Result<Self> {
        let current_deps = current.dependencies();
        let previous_deps = previous.dependencies();
        let dep_fields: Vec<&str> = current_deps.fields().chain(previous_deps.fields()).collect();

        let before = to_object(previous)?;
        let after = to_object(current)?;

        let mut fields: Vec<String> = after
            .iter()
            .filter(|(k, _)| !dep_fields.contains(&k.as_str()))
            .filter(|(k, v)| before.get(*k).unwrap_or(&Value::Null) != *v)
            .map(|(k, _)| k.clone())
            .collect();
        // fields dropped from the current serialization
        fields.extend(
            before
                .keys()
                .filter(|k| !after.contains_key(*k) && !dep_fields.contains(&k.as_str()))
                .cloned(),
        );
        fields.sort();

        let dependencies = current_deps
            .changed_since(&previous_deps)
            .into_iter()
            .map(String::from)
            .collect();

        Ok(Self {
            fields,
            dependencies,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.dependencies.is_empty()
    }

    /// All changed names, fields first
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .chain(self.dependencies.iter())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::{Dependency, DependencySet};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Empty;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct AgentConfig {
        instructions: String,
        model: Dependency<Empty>,
        tools: Vec<Dependency<Empty>>,
    }

    impl Config for AgentConfig {
        fn dependencies(&self) -> DependencySet {
            DependencySet::new()
                .required("model", &self.model)
                .list("tools", &self.tools)
        }
    }

    fn config() -> AgentConfig {
        AgentConfig {
            instructions: "be brief".into(),
            model: Dependency::parse("agno/models/openai/gpt").unwrap(),
            tools: vec![
                Dependency::parse("agno/tools/mcp/a").unwrap(),
                Dependency::parse("agno/tools/mcp/b").unwrap(),
            ],
        }
    }

    #[test]
    fn test_identical_configs_have_no_diff() {
        assert!(ConfigDiff::between(&config(), &config()).unwrap().is_empty());
    }

    #[test]
    fn test_reordered_list_dependency_is_not_a_change() {
        let mut next = config();
        next.tools.reverse();
        assert!(ConfigDiff::between(&config(), &next).unwrap().is_empty());
    }

    #[test]
    fn test_duplicated_list_dependency_is_a_change() {
        let mut next = config();
        next.tools.push(Dependency::parse("agno/tools/mcp/a").unwrap());
        let diff = ConfigDiff::between(&config(), &next).unwrap();
        assert_eq!(diff.dependencies, vec!["tools"]);
    }

    #[test]
    fn test_field_and_dependency_changes() {
        let mut next = config();
        next.instructions = "be thorough".into();
        next.model = Dependency::parse("agno/models/anthropic/claude").unwrap();

        let diff = ConfigDiff::between(&config(), &next).unwrap();
        assert_eq!(diff.fields, vec!["instructions"]);
        assert_eq!(diff.dependencies, vec!["model"]);
        assert_eq!(diff.changed().collect::<Vec<_>>(), vec!["instructions", "model"]);
    }
}
