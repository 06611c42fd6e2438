//! Kubernetes ConfigMap resource (`kubernetes/configmap`)

use crate::api::{KubeApi, KubeConnector, ObjectRef, cluster_gone};
use crate::kubectl::KubectlConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::health::{self, LogStream};
use pragma_core::{
    Config, Dependency, DependencySet, HealthCheckable, HealthStatus, Lifecycle, LogSource,
    ResolutionContext, ResourceError, Result,
};
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

const MAX_KEY_LEN: usize = 253;

fn default_namespace() -> String {
    "default".to_string()
}

/// Keys of ConfigMap and Secret data: `[-._a-zA-Z0-9]+`, at most 253 chars
pub(crate) fn validate_keys<'a>(keys: impl IntoIterator<Item = &'a String>) -> Result<()> {
    for key in keys {
        let valid = !key.is_empty()
            && key.len() <= MAX_KEY_LEN
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'));
        if !valid {
            return Err(ResourceError::Validation(format!(
                "data key '{key}' must be 1 to 253 of [-._a-zA-Z0-9]"
            )));
        }
    }
    Ok(())
}

/// Number of entries under `field` of an observed object
pub(crate) fn entry_count(object: &Value, field: &str) -> usize {
    object[field].as_object().map_or(0, |m| m.len())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMapConfig {
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Base64-encoded values
    #[serde(default)]
    pub binary_data: BTreeMap<String, String>,
}

impl Config for ConfigMapConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster", "namespace"];

    fn validate(&self) -> Result<()> {
        validate_keys(self.data.keys().chain(self.binary_data.keys()))?;
        if let Some(key) = self.data.keys().find(|k| self.binary_data.contains_key(*k)) {
            return Err(ResourceError::Validation(format!(
                "key '{key}' is in both data and binary_data"
            )));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMapOutputs {
    pub name: String,
    pub namespace: String,
    pub data: BTreeMap<String, String>,
}

pub struct ConfigMap {
    name: String,
    config: ConfigMapConfig,
    connector: Arc<dyn KubeConnector>,
}

impl ConfigMap {
    pub fn new(name: impl Into<String>, config: ConfigMapConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: ConfigMapConfig,
        connector: Arc<dyn KubeConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
        }
    }

    fn object(&self) -> ObjectRef {
        ObjectRef::namespaced("configmap", &self.config.namespace, &self.name)
    }

    fn client(&self, ctx: &ResolutionContext) -> Result<Arc<dyn KubeApi>> {
        let cluster = ctx.resolved(&self.config.cluster)?;
        Ok(self.connector.connect(&cluster)?)
    }

    pub fn manifest(&self) -> Value {
        let mut manifest = json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": self.name,
                "namespace": self.config.namespace,
            },
            "data": self.config.data,
        });
        if !self.config.binary_data.is_empty() {
            manifest["binaryData"] = json!(self.config.binary_data);
        }
        manifest
    }

    async fn apply(&self, ctx: &ResolutionContext) -> Result<ConfigMapOutputs> {
        let client = self.client(ctx)?;
        client.apply(&self.manifest()).await?;
        tracing::info!("Applied configmap {}", self.object());

        Ok(ConfigMapOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
            data: self.config.data.clone(),
        })
    }
}

#[async_trait]
impl Lifecycle for ConfigMap {
    const PROVIDER: &'static str = "kubernetes";
    const RESOURCE: &'static str = "configmap";

    type Config = ConfigMapConfig;
    type Outputs = ConfigMapOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ConfigMapConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<ConfigMapOutputs> {
        self.apply(ctx).await
    }

    async fn update(
        &self,
        _previous: &ConfigMapConfig,
        _current: Option<&ConfigMapOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<ConfigMapOutputs> {
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
                tracing::warn!("ConfigMap {} already deleted", self.object());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl HealthCheckable for ConfigMap {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus> {
        let client = self.client(ctx)?;
        let Some(observed) = client.get(&self.object()).await? else {
            return Ok(HealthStatus::unhealthy(format!(
                "ConfigMap {} not found",
                self.name
            )));
        };
        let keys = entry_count(&observed, "data") + entry_count(&observed, "binaryData");
        Ok(HealthStatus::healthy(format!("ConfigMap {} exists", self.name))
            .with_detail("key_count", keys))
    }
}

#[async_trait]
impl LogSource for ConfigMap {
    async fn logs(
        &self,
        _ctx: &ResolutionContext,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> Result<LogStream> {
        Ok(health::sentinel("ConfigMaps do not produce logs"))
    }
}
