//! Kubernetes Secret resource (`kubernetes/secret`)
//!
//! Values go to the cluster only. Outputs name the keys, never the values.

use crate::api::{KubeApi, KubeConnector, ObjectRef, cluster_gone};
use crate::configmap::{entry_count, validate_keys};
use crate::kubectl::KubectlConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::health::{self, LogStream};
use pragma_core::{
    Config, Dependency, DependencySet, HealthCheckable, HealthStatus, Lifecycle, LogSource,
    ResolutionContext, Result,
};
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

fn default_namespace() -> String {
    "default".to_string()
}

fn default_type() -> String {
    "Opaque".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretConfig {
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_type", rename = "type")]
    pub secret_type: String,
    /// Base64-encoded values
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Plain values, encoded by the API server
    #[serde(default)]
    pub string_data: BTreeMap<String, String>,
}

impl Config for SecretConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster", "namespace", "type"];

    fn validate(&self) -> Result<()> {
        validate_keys(self.data.keys().chain(self.string_data.keys()))
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretOutputs {
    pub name: String,
    pub namespace: String,
    #[serde(rename = "type")]
    pub secret_type: String,
    pub keys: Vec<String>,
}

pub struct Secret {
    name: String,
    config: SecretConfig,
    connector: Arc<dyn KubeConnector>,
}

impl Secret {
    pub fn new(name: impl Into<String>, config: SecretConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: SecretConfig,
        connector: Arc<dyn KubeConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
        }
    }

    fn object(&self) -> ObjectRef {
        ObjectRef::namespaced("secret", &self.config.namespace, &self.name)
    }

    fn client(&self, ctx: &ResolutionContext) -> Result<Arc<dyn KubeApi>> {
        let cluster = ctx.resolved(&self.config.cluster)?;
        Ok(self.connector.connect(&cluster)?)
    }

    pub fn manifest(&self) -> Value {
        let mut manifest = json!({
            "apiVersion": "v1",
            "kind": "Secret",
            "metadata": {
                "name": self.name,
                "namespace": self.config.namespace,
            },
            "type": self.config.secret_type,
            "data": self.config.data,
        });
        if !self.config.string_data.is_empty() {
            manifest["stringData"] = json!(self.config.string_data);
        }
        manifest
    }

    fn keys(&self) -> Vec<String> {
        self.config
            .data
            .keys()
            .chain(self.config.string_data.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    async fn apply(&self, ctx: &ResolutionContext) -> Result<SecretOutputs> {
        let client = self.client(ctx)?;
        client.apply(&self.manifest()).await?;
        tracing::info!("Applied secret {}", self.object());

        Ok(SecretOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
            secret_type: self.config.secret_type.clone(),
            keys: self.keys(),
        })
    }
}

#[async_trait]
impl Lifecycle for Secret {
    const PROVIDER: &'static str = "kubernetes";
    const RESOURCE: &'static str = "secret";

    type Config = SecretConfig;
    type Outputs = SecretOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &SecretConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<SecretOutputs> {
        self.apply(ctx).await
    }

    async fn update(
        &self,
        _previous: &SecretConfig,
        _current: Option<&SecretOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<SecretOutputs> {
        self.apply(ctx).await
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        if cluster_gone(ctx, &self.config.cluster, &self.object()) {
            return Ok(());
        }
        let client = self.client(ctx)?;
        match client.delete(&self.object()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Secret {} already deleted", self.object());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HealthCheckable for Secret {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus> {
        let client = self.client(ctx)?;
        let Some(observed) = client.get(&self.object()).await? else {
            return Ok(HealthStatus::unhealthy(format!(
                "Secret {} not found",
                self.name
            )));
        };
        let secret_type = observed["type"].as_str().unwrap_or("Opaque").to_string();
        Ok(HealthStatus::healthy(format!("Secret {} exists", self.name))
            .with_detail("key_count", entry_count(&observed, "data"))
            .with_detail("type", secret_type))
    }
}

#[async_trait]
impl LogSource for Secret {
    async fn logs(
        &self,
        _ctx: &ResolutionContext,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> Result<LogStream> {
        Ok(health::sentinel("Secrets do not produce logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_merged_and_sorted() {
        let config: SecretConfig = serde_json::from_value(json!({
            "cluster": "gcp/gke/primary",
            "data": {"tls.crt": "Y2VydA=="},
            "string_data": {"api-key": "k", "tls.crt": "override"}
        }))
        .unwrap();
        let secret = Secret::new("creds", config);

        assert_eq!(secret.keys(), ["api-key", "tls.crt"]);
        let manifest = secret.manifest();
        assert_eq!(manifest["type"], "Opaque");
        assert_eq!(manifest["stringData"]["api-key"], "k");
    }
}
