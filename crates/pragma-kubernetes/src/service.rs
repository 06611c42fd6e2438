//! Kubernetes Service resource (`kubernetes/service`)

use crate::api::{KubeApi, KubeConnector, ObjectRef, cluster_gone};
use crate::deployment::Protocol;
use crate::kubectl::KubectlConnector;
use async_trait::async_trait;
use pragma_core::{
    Config, Dependency, DependencySet, Lifecycle, ResolutionContext, ResourceError, Result,
};
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceType {
    #[default]
    ClusterIP,
    NodePort,
    LoadBalancer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    pub name: String,
    pub port: u16,
    pub target_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default, rename = "type")]
    pub service_type: ServiceType,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<PortConfig>,
}

impl Config for ServiceConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster", "namespace"];

    fn validate(&self) -> Result<()> {
        if self.ports.is_empty() {
            return Err(ResourceError::Validation(
                "service needs at least one port".into(),
            ));
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOutputs {
    pub name: String,
    pub namespace: String,
    pub cluster_ip: Option<String>,
    /// In-cluster DNS name
    pub url: String,
}

pub struct Service {
    name: String,
    config: ServiceConfig,
    connector: Arc<dyn KubeConnector>,
}

impl Service {
    pub fn new(name: impl Into<String>, config: ServiceConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: ServiceConfig,
        connector: Arc<dyn KubeConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
        }
    }

    fn object(&self) -> ObjectRef {
        ObjectRef::namespaced("service", &self.config.namespace, &self.name)
    }

    fn client(&self, ctx: &ResolutionContext) -> Result<Arc<dyn KubeApi>> {
        let cluster = ctx.resolved(&self.config.cluster)?;
        Ok(self.connector.connect(&cluster)?)
    }

    pub fn url(&self) -> String {
        format!(
            "http://{}.{}.svc.cluster.local",
            self.name, self.config.namespace
        )
    }

    pub fn manifest(&self) -> Value {
        let ports: Vec<Value> = self
            .config
            .ports
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "port": p.port,
                    "targetPort": p.target_port,
                    "protocol": p.protocol,
                })
            })
            .collect();

        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": self.name,
                "namespace": self.config.namespace,
            },
            "spec": {
                "type": self.config.service_type,
                "selector": self.config.selector,
                "ports": ports,
            }
        })
    }

    /// Services are usable as soon as the API accepts them
    async fn apply(&self, ctx: &ResolutionContext) -> Result<ServiceOutputs> {
        let client = self.client(ctx)?;
        let applied = client.apply(&self.manifest()).await?;
        tracing::info!("Applied service {}", self.object());

        Ok(ServiceOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
            cluster_ip: applied["spec"]["clusterIP"].as_str().map(String::from),
            url: self.url(),
        })
    }
}

#[async_trait]
impl Lifecycle for Service {
    const PROVIDER: &'static str = "kubernetes";
    const RESOURCE: &'static str = "service";

    type Config = ServiceConfig;
    type Outputs = ServiceOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &ServiceConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<ServiceOutputs> {
        self.apply(ctx).await
    }

    async fn update(
        &self,
        _previous: &ServiceConfig,
        _current: Option<&ServiceOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<ServiceOutputs> {
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
                tracing::warn!("Service {} already deleted", self.object());
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
