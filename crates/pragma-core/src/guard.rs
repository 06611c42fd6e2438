//! Immutable field enforcement for updates

use crate::error::{ResourceError, Result};
use crate::resource::Config;
use serde_json::{Map, Value};

/// Reject an update that touches any of `C::IMMUTABLE_FIELDS`.
///
/// Runs before any external call. Every declared field is checked; the first
/// differing one (in declaration order) is reported.
pub fn check_immutable<C: Config>(previous: &C, current: &C) -> Result<()> {
    let previous = to_object(previous)?;
    let current = to_object(current)?;

    for field in C::IMMUTABLE_FIELDS {
        if !previous.contains_key(*field) && !current.contains_key(*field) {
            return Err(ResourceError::Validation(format!(
                "'{field}' is declared immutable but is not a field of this config"
            )));
        }
        let before = previous.get(*field).unwrap_or(&Value::Null);
        let after = current.get(*field).unwrap_or(&Value::Null);
        if before != after {
            tracing::debug!("Rejecting update: {} changed", field);
            return Err(ResourceError::ImmutableField {
                field: field.to_string(),
            });
        }
    }

    Ok(())
}

pub(crate) fn to_object<C: Config>(config: &C) -> Result<Map<String, Value>> {
    match serde_json::to_value(config)? {
        Value::Object(map) => Ok(map),
        other => Err(ResourceError::Validation(format!(
            "config must serialize to an object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct ClusterConfig {
        project_id: String,
        region: String,
        node_count: u32,
        network: Option<String>,
    }

    impl Config for ClusterConfig {
        const IMMUTABLE_FIELDS: &'static [&'static str] = &["project_id", "region", "network"];
    }

    fn base() -> ClusterConfig {
        ClusterConfig {
            project_id: "proj".into(),
            region: "europe-west4".into(),
            node_count: 3,
            network: None,
        }
    }

    #[test]
    fn test_mutable_change_passes() {
        let mut next = base();
        next.node_count = 5;
        assert!(check_immutable(&base(), &next).is_ok());
    }

    #[test]
    fn test_immutable_change_rejected() {
        let mut next = base();
        next.region = "us-central1".into();
        let err = check_immutable(&base(), &next).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot change region; delete and recreate resource"
        );
    }

    #[test]
    fn test_none_to_some_is_a_change() {
        let mut next = base();
        next.network = Some("vpc".into());
        let err = check_immutable(&base(), &next).unwrap_err();
        assert!(matches!(err, ResourceError::ImmutableField { field } if field == "network"));
    }

    #[test]
    fn test_first_declared_field_reported() {
        let mut next = base();
        next.project_id = "other".into();
        next.region = "us-central1".into();
        let err = check_immutable(&base(), &next).unwrap_err();
        assert!(matches!(err, ResourceError::ImmutableField { field } if field == "project_id"));
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Typo {
        region: String,
    }

    impl Config for Typo {
        const IMMUTABLE_FIELDS: &'static [&'static str] = &["regoin"];
    }

    #[test]
    fn test_undeclared_field_is_a_validation_error() {
        let cfg = Typo { region: "x".into() };
        assert!(matches!(
            check_immutable(&cfg, &cfg),
            Err(ResourceError::Validation(_))
        ));
    }
}
