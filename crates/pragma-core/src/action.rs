//! Planned lifecycle actions

use crate::resource::ResourceKey;
use serde::{Deserialize, Serialize};

/// Planned action for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub key: ResourceKey,

    pub action_type: ActionType,

    /// Changed fields and dependency slots (empty for create and no-op)
    pub changed: Vec<String>,

    pub description: String,
}

impl Action {
    pub fn new(key: ResourceKey, action_type: ActionType, changed: Vec<String>) -> Self {
        let description = match action_type {
            ActionType::Create => format!("create {key}"),
            ActionType::Update => format!("update {key} ({})", changed.join(", ")),
            ActionType::Delete => format!("delete {key}"),
            ActionType::NoOp => format!("{key} is up to date"),
        };
        Self {
            key,
            action_type,
            changed,
            description,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Create,
    Update,
    Delete,
    NoOp,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Actions for a set of resources, in dependency order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions }
    }

    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|a| a.action_type != ActionType::NoOp)
    }

    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }
}
