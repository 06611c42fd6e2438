//! Kubernetes Deployment resource (`kubernetes/deployment`)

use crate::api::{KubeApi, KubeConnector, ObjectRef, cluster_gone};
use crate::kubectl::KubectlConnector;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use pragma_core::health::LogStream;
use pragma_core::{
    Config, ConvergencePoller, Dependency, DependencySet, HealthCheckable, HealthStatus,
    Lifecycle, LogEntry, LogLevel, LogSource, PollSettings, ResolutionContext, ResourceError,
    Result, Settings, Verdict,
};
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const DEFAULT_POLL: PollSettings = PollSettings::new(5, 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpGetConfig {
    pub path: String,
    pub port: u16,
}

fn default_period() -> u32 {
    10
}

fn default_timeout() -> u32 {
    1
}

fn default_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub http_get: Option<HttpGetConfig>,
    #[serde(default)]
    pub initial_delay_seconds: u32,
    #[serde(default = "default_period")]
    pub period_seconds: u32,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl ProbeConfig {
    pub fn http(path: impl Into<String>, port: u16) -> Self {
        Self {
            http_get: Some(HttpGetConfig {
                path: path.into(),
                port,
            }),
            initial_delay_seconds: 0,
            period_seconds: default_period(),
            timeout_seconds: default_timeout(),
            failure_threshold: default_failure_threshold(),
        }
    }

    /// Probes without an HTTP action are dropped from the manifest
    fn manifest(&self) -> Option<Value> {
        let http = self.http_get.as_ref()?;
        Some(json!({
            "httpGet": { "path": http.path, "port": http.port },
            "initialDelaySeconds": self.initial_delay_seconds,
            "periodSeconds": self.period_seconds,
            "timeoutSeconds": self.timeout_seconds,
            "failureThreshold": self.failure_threshold,
        }))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirementsConfig {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
    #[serde(default)]
    pub cpu_limit: Option<String>,
    #[serde(default)]
    pub memory_limit: Option<String>,
}

impl ResourceRequirementsConfig {
    fn manifest(&self) -> Value {
        let mut requests = Map::new();
        let mut limits = Map::new();
        if let Some(cpu) = &self.cpu {
            requests.insert("cpu".into(), cpu.clone().into());
        }
        if let Some(memory) = &self.memory {
            requests.insert("memory".into(), memory.clone().into());
        }
        if let Some(cpu) = &self.cpu_limit {
            limits.insert("cpu".into(), cpu.clone().into());
        }
        if let Some(memory) = &self.memory_limit {
            limits.insert("memory".into(), memory.clone().into());
        }

        let mut resources = Map::new();
        if !requests.is_empty() {
            resources.insert("requests".into(), Value::Object(requests));
        }
        if !limits.is_empty() {
            resources.insert("limits".into(), Value::Object(limits));
        }
        Value::Object(resources)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerPortConfig {
    pub container_port: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub protocol: Protocol,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub name: String,
    pub image: String,
    #[serde(default)]
    pub ports: Vec<ContainerPortConfig>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// env name -> `secret_name.key`
    #[serde(default)]
    pub env_from_secret: BTreeMap<String, String>,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub resources: Option<ResourceRequirementsConfig>,
    #[serde(default)]
    pub startup_probe: Option<ProbeConfig>,
    #[serde(default)]
    pub liveness_probe: Option<ProbeConfig>,
    #[serde(default)]
    pub readiness_probe: Option<ProbeConfig>,
}

impl ContainerConfig {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ports: Vec::new(),
            env: BTreeMap::new(),
            env_from_secret: BTreeMap::new(),
            command: Vec::new(),
            args: Vec::new(),
            resources: None,
            startup_probe: None,
            liveness_probe: None,
            readiness_probe: None,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.image.trim().is_empty() {
            return Err(ResourceError::Validation(
                "containers need a name and an image".into(),
            ));
        }
        for secret_ref in self.env_from_secret.values() {
            split_secret_ref(secret_ref)?;
        }
        Ok(())
    }

    fn manifest(&self) -> Result<Value> {
        let mut container = Map::new();
        container.insert("name".into(), self.name.clone().into());
        container.insert("image".into(), self.image.clone().into());

        if !self.ports.is_empty() {
            let ports: Vec<Value> = self
                .ports
                .iter()
                .map(|p| {
                    let mut port = json!({
                        "containerPort": p.container_port,
                        "protocol": p.protocol,
                    });
                    if let Some(name) = &p.name {
                        port["name"] = name.clone().into();
                    }
                    port
                })
                .collect();
            container.insert("ports".into(), ports.into());
        }

        let mut env: Vec<Value> = self
            .env
            .iter()
            .map(|(name, value)| json!({ "name": name, "value": value }))
            .collect();
        for (name, secret_ref) in &self.env_from_secret {
            let (secret, key) = split_secret_ref(secret_ref)?;
            env.push(json!({
                "name": name,
                "valueFrom": { "secretKeyRef": { "name": secret, "key": key } }
            }));
        }
        if !env.is_empty() {
            container.insert("env".into(), env.into());
        }

        if !self.command.is_empty() {
            container.insert("command".into(), json!(self.command));
        }
        if !self.args.is_empty() {
            container.insert("args".into(), json!(self.args));
        }
        if let Some(resources) = &self.resources {
            container.insert("resources".into(), resources.manifest());
        }

        for (field, probe) in [
            ("startupProbe", &self.startup_probe),
            ("livenessProbe", &self.liveness_probe),
            ("readinessProbe", &self.readiness_probe),
        ] {
            if let Some(probe) = probe.as_ref().and_then(ProbeConfig::manifest) {
                container.insert(field.into(), probe);
            }
        }

        Ok(Value::Object(container))
    }
}

fn split_secret_ref(secret_ref: &str) -> Result<(&str, &str)> {
    match secret_ref.rsplit_once('.') {
        Some((secret, key)) if !secret.is_empty() && !key.is_empty() => Ok((secret, key)),
        _ => Err(ResourceError::Validation(format!(
            "Invalid secret reference '{secret_ref}': expected 'secret_name.key'"
        ))),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    #[default]
    RollingUpdate,
    Recreate,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    pub selector: BTreeMap<String, String>,
    /// Pod labels; the selector when unset
    #[serde(default)]
    pub labels: Option<BTreeMap<String, String>>,
    pub containers: Vec<ContainerConfig>,
    #[serde(default)]
    pub strategy: Strategy,
}

impl Config for DeploymentConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster", "namespace", "selector"];

    fn validate(&self) -> Result<()> {
        if self.selector.is_empty() {
            return Err(ResourceError::Validation("selector must not be empty".into()));
        }
        if self.containers.is_empty() {
            return Err(ResourceError::Validation(
                "at least one container is required".into(),
            ));
        }
        for container in &self.containers {
            container.validate()?;
        }
        Ok(())
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new().required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentOutputs {
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub ready_replicas: u32,
    pub available_replicas: u32,
}

fn status_count(object: &Value, field: &str) -> u32 {
    object["status"][field].as_u64().unwrap_or(0) as u32
}

pub struct Deployment {
    name: String,
    config: DeploymentConfig,
    connector: Arc<dyn KubeConnector>,
    poller: ConvergencePoller,
}

impl Deployment {
    pub fn new(name: impl Into<String>, config: DeploymentConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: DeploymentConfig,
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
        ObjectRef::namespaced("deployment", &self.config.namespace, &self.name)
    }

    fn client(&self, ctx: &ResolutionContext) -> Result<Arc<dyn KubeApi>> {
        let cluster = ctx.resolved(&self.config.cluster)?;
        Ok(self.connector.connect(&cluster)?)
    }

    pub fn manifest(&self) -> Result<Value> {
        let labels = self.config.labels.as_ref().unwrap_or(&self.config.selector);
        let containers = self
            .config
            .containers
            .iter()
            .map(ContainerConfig::manifest)
            .collect::<Result<Vec<_>>>()?;

        let strategy = match self.config.strategy {
            Strategy::RollingUpdate => json!({
                "type": "RollingUpdate",
                "rollingUpdate": { "maxSurge": "25%", "maxUnavailable": "25%" }
            }),
            Strategy::Recreate => json!({ "type": "Recreate" }),
        };

        Ok(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": self.name,
                "namespace": self.config.namespace,
            },
            "spec": {
                "replicas": self.config.replicas,
                "selector": { "matchLabels": self.config.selector },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": { "containers": containers },
                },
                "strategy": strategy,
            }
        }))
    }

    fn outputs(&self, object: Option<&Value>) -> DeploymentOutputs {
        DeploymentOutputs {
            name: self.name.clone(),
            namespace: self.config.namespace.clone(),
            replicas: self.config.replicas,
            ready_replicas: object.map(|o| status_count(o, "readyReplicas")).unwrap_or(0),
            available_replicas: object
                .map(|o| status_count(o, "availableReplicas"))
                .unwrap_or(0),
        }
    }

    async fn apply_and_wait(&self, ctx: &ResolutionContext) -> Result<DeploymentOutputs> {
        let client = self.client(ctx)?;
        client.apply(&self.manifest()?).await?;
        tracing::info!("Applied deployment {}", self.object());

        let desired = self.config.replicas;
        if desired == 0 {
            return Ok(self.outputs(None));
        }

        let client = client.as_ref();
        let object = self.object();
        let object = &object;
        let label = object.to_string();
        let ready = self
            .poller
            .wait_until(
                &label,
                move || async move { client.get(object).await.map_err(ResourceError::from) },
                |deployment: &Value| {
                    if status_count(deployment, "readyReplicas") >= desired {
                        Verdict::Ready
                    } else {
                        Verdict::Pending
                    }
                },
            )
            .await?;
        Ok(self.outputs(Some(&ready)))
    }
}

#[async_trait]
impl Lifecycle for Deployment {
    const PROVIDER: &'static str = "kubernetes";
    const RESOURCE: &'static str = "deployment";

    type Config = DeploymentConfig;
    type Outputs = DeploymentOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &DeploymentConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<DeploymentOutputs> {
        self.apply_and_wait(ctx).await
    }

    async fn update(
        &self,
        _previous: &DeploymentConfig,
        _current: Option<&DeploymentOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<DeploymentOutputs> {
        self.apply_and_wait(ctx).await
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        if cluster_gone(ctx, &self.config.cluster, &self.object()) {
            return Ok(());
        }
        let client = self.client(ctx)?;
        match client.delete(&self.object()).await {
            Ok(()) => tracing::info!("Deleted deployment {}", self.object()),
            Err(e) if e.is_not_found() => {
                tracing::warn!("Deployment {} already deleted", self.object());
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }
}

#[async_trait]
impl HealthCheckable for Deployment {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus> {
        let client = self.client(ctx)?;
        let Some(deployment) = client.get(&self.object()).await? else {
            return Ok(HealthStatus::unhealthy("Deployment not found"));
        };

        let ready = status_count(&deployment, "readyReplicas");
        let desired = deployment["spec"]["replicas"].as_u64().unwrap_or(0) as u32;

        let status = if ready >= desired && desired > 0 {
            HealthStatus::healthy(format!("All {ready} replicas ready"))
        } else if ready > 0 {
            HealthStatus::degraded(format!("{ready}/{desired} replicas ready"))
        } else {
            HealthStatus::unhealthy(format!("No replicas ready (desired: {desired})"))
        };
        Ok(status
            .with_detail("ready_replicas", ready)
            .with_detail("desired_replicas", desired))
    }
}

/// Split a `kubectl logs --timestamps` line into its timestamp and message
fn parse_log_line(line: &str) -> (DateTime<Utc>, &str) {
    line.split_once(' ')
        .and_then(|(ts, msg)| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|t| (t.with_timezone(&Utc), msg))
        })
        .unwrap_or_else(|| (Utc::now(), line))
}

/// One pod's lines, or a single warning when the pod could not be read
async fn pod_entries(
    client: &dyn KubeApi,
    namespace: &str,
    pod: &str,
    since: Option<DateTime<Utc>>,
    tail: usize,
) -> Vec<LogEntry> {
    match client.pod_logs(namespace, pod, since, tail).await {
        Ok(text) => text
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (timestamp, message) = parse_log_line(line);
                LogEntry::new(timestamp, LogLevel::Info, message).with_metadata("pod", pod)
            })
            .collect(),
        Err(e) => {
            tracing::warn!("Failed to fetch logs from pod {}: {}", pod, e);
            vec![
                LogEntry::new(
                    Utc::now(),
                    LogLevel::Warn,
                    format!("Failed to fetch logs from pod {pod}"),
                )
                .with_metadata("pod", pod),
            ]
        }
    }
}

#[async_trait]
impl LogSource for Deployment {
    async fn logs(
        &self,
        ctx: &ResolutionContext,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<LogStream> {
        let client = self.client(ctx)?;
        let pods = client
            .list_pods(&self.config.namespace, &self.config.selector)
            .await?;
        let namespace = self.config.namespace.clone();

        // pods are read one at a time as the stream is polled
        let stream = stream::unfold(pods.into_iter(), move |mut pods| {
            let client = client.clone();
            let namespace = namespace.clone();
            async move {
                let pod = pods.next()?;
                let entries = pod_entries(client.as_ref(), &namespace, &pod, since, tail).await;
                Some((stream::iter(entries), pods))
            }
        })
        .flatten();

        Ok(stream.boxed())
    }
}
