//! Kubernetes Namespace resource (`kubernetes/namespace`)

use crate::api::{KubeApi, KubeConnector, ObjectRef, cluster_gone};
use crate::kubectl::KubectlConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::health::{self, LogStream};
use pragma_core::{
    Config, ConvergencePoller, Dependency, DependencySet, HealthCheckable, HealthStatus,
    Lifecycle, LogSource, PollSettings, ResolutionContext, ResourceError, Result, Settings,
    Verdict,
};
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_POLL: PollSettings = PollSettings::new(2, 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceConfig {
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Config for NamespaceConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster"];

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamespaceOutputs {
    pub name: String,
    pub phase: String,
}

fn phase(namespace: &Value) -> &str {
    namespace["status"]["phase"].as_str().unwrap_or("")
}

pub struct Namespace {
    name: String,
    config: NamespaceConfig,
    connector: Arc<dyn KubeConnector>,
    poller: ConvergencePoller,
}

impl Namespace {
    pub fn new(name: impl Into<String>, config: NamespaceConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: NamespaceConfig,
        connector: Arc<dyn KubeConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
            poller: ConvergencePoller::from_settings(DEFAULT_POLL),
        }
    }

    pub fn with_poller(mut self, poller: ConvergencePoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_settings(self, settings: &Settings) -> Self {
        let poller =
            ConvergencePoller::for_resource(settings, Self::PROVIDER, Self::RESOURCE, DEFAULT_POLL);
        self.with_poller(poller)
    }

    fn object(&self) -> ObjectRef {
        ObjectRef::cluster_scoped("namespace", &self.name)
    }

    fn client(&self, ctx: &ResolutionContext) -> Result<Arc<dyn KubeApi>> {
        let cluster = ctx.resolved(&self.config.cluster)?;
        Ok(self.connector.connect(&cluster)?)
    }

    pub fn manifest(&self) -> Value {
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {
                "name": self.name,
                "labels": self.config.labels,
            }
        })
    }

    async fn apply_and_wait(&self, ctx: &ResolutionContext) -> Result<NamespaceOutputs> {
        let client = self.client(ctx)?;
        client.apply(&self.manifest()).await?;
        tracing::info!("Applied namespace {}", self.name);

        let client = client.as_ref();
        let object = self.object();
        let object = &object;
        let active = self
            .poller
            .wait_until(
                &self.name,
                move || async move { client.get(object).await.map_err(ResourceError::from) },
                |ns: &Value| match phase(ns) {
                    "Active" => Verdict::Ready,
                    _ => Verdict::Pending,
                },
            )
            .await?;

        Ok(NamespaceOutputs {
            name: self.name.clone(),
            phase: phase(&active).to_string(),
        })
    }
}

#[async_trait]
impl Lifecycle for Namespace {
    const PROVIDER: &'static str = "kubernetes";
    const RESOURCE: &'static str = "namespace";

    type Config = NamespaceConfig;
    type Outputs = NamespaceOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &NamespaceConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<NamespaceOutputs> {
        self.apply_and_wait(ctx).await
    }

    async fn update(
        &self,
        _previous: &NamespaceConfig,
        _current: Option<&NamespaceOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<NamespaceOutputs> {
        self.apply_and_wait(ctx).await
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        if cluster_gone(ctx, &self.config.cluster, &self.object()) {
            return Ok(());
        }
        let client = self.client(ctx)?;
        match client.delete(&self.object()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("Namespace {} already deleted", self.name);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        // Terminating namespaces linger until their contents are gone
        let client = client.as_ref();
        let object = self.object();
        let object = &object;
        self.poller
            .wait_until_gone(&self.name, move || async move {
                client.get(object).await.map_err(ResourceError::from)
            })
            .await
    }
}

#[async_trait]
impl HealthCheckable for Namespace {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus> {
        let client = self.client(ctx)?;
        let Some(ns) = client.get(&self.object()).await? else {
            return Ok(HealthStatus::unhealthy("Namespace not found"));
        };

        let current = phase(&ns);
        let status = if current == "Active" {
            HealthStatus::healthy(format!("Namespace {} is active", self.name))
        } else {
            HealthStatus::degraded(format!("Namespace {} phase: {}", self.name, current))
        };
        Ok(status.with_detail("phase", current))
    }
}

#[async_trait]
impl LogSource for Namespace {
    async fn logs(
        &self,
        _ctx: &ResolutionContext,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> Result<LogStream> {
        Ok(health::sentinel("Namespaces do not produce logs"))
    }
}
