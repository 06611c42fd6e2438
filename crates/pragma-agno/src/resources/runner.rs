//! Agent/team runner on Kubernetes (`agno/runner`)
//!
//! The only agno resource with infrastructure behind it. It compiles the
//! referenced agent or team into a [`RunnerSpec`] and deploys it as a child
//! `kubernetes/deployment` plus `kubernetes/service`. The container receives
//! the spec through `AGNO_SPEC_TYPE` and `AGNO_SPEC_JSON`.

use crate::error::AgnoError;
use crate::resources::agent::{AgentOutputs, AgentSpec};
use crate::resources::team::{TeamOutputs, TeamSpec};
use crate::runtime::Deployed;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::health::LogStream;
use pragma_core::spec::encode;
use pragma_core::{
    Compile, Config, ConvergencePoller, Dependency, DependencySet, HealthCheckable, HealthStatus,
    Lifecycle, LogSource, ResolutionContext, ResourceError, Result, Settings,
};
use pragma_gcp::GkeOutputs;
use pragma_kubernetes::deployment::DEFAULT_POLL;
use pragma_kubernetes::{
    ContainerConfig, ContainerPortConfig, Deployment, DeploymentConfig, KubeConnector,
    KubectlConnector, PortConfig, ProbeConfig, ResourceRequirementsConfig, Service, ServiceConfig,
    ServiceType, Strategy,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const SPEC_TYPE_ENV: &str = "AGNO_SPEC_TYPE";
pub const SPEC_JSON_ENV: &str = "AGNO_SPEC_JSON";
pub const DEFAULT_IMAGE: &str = "ghcr.io/pragmatiks/agno-runner:latest";
pub const RUNNER_PORT: u16 = 8000;

/// The compiled agent or team a runner serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "spec", rename_all = "lowercase")]
pub enum DeployedSpec {
    Agent(AgentSpec),
    Team(TeamSpec),
}

impl DeployedSpec {
    pub fn spec_type(&self) -> &'static str {
        match self {
            DeployedSpec::Agent(_) => "agent",
            DeployedSpec::Team(_) => "team",
        }
    }

    /// JSON of the inner spec, as passed in `AGNO_SPEC_JSON`
    pub fn to_json(&self) -> Result<String> {
        match self {
            DeployedSpec::Agent(agent) => encode(agent),
            DeployedSpec::Team(team) => encode(team),
        }
    }

    /// Inverse of [`spec_type`](Self::spec_type) plus [`to_json`](Self::to_json)
    pub fn decode(spec_type: &str, json: &str) -> crate::Result<Self> {
        match spec_type {
            "agent" => serde_json::from_str(json)
                .map(DeployedSpec::Agent)
                .map_err(|source| AgnoError::InvalidSpec {
                    kind: "agent",
                    source,
                }),
            "team" => serde_json::from_str(json)
                .map(DeployedSpec::Team)
                .map_err(|source| AgnoError::InvalidSpec {
                    kind: "team",
                    source,
                }),
            other => Err(AgnoError::UnknownSpecType(other.to_string())),
        }
    }
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replicas() -> u32 {
    1
}

fn default_image() -> String {
    DEFAULT_IMAGE.to_string()
}

fn default_cpu() -> String {
    "200m".to_string()
}

fn default_memory() -> String {
    "1Gi".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub agent: Option<Dependency<AgentOutputs>>,
    #[serde(default)]
    pub team: Option<Dependency<TeamOutputs>>,
    pub cluster: Dependency<GkeOutputs>,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_replicas")]
    pub replicas: u32,
    #[serde(default = "default_image")]
    pub image: String,
    /// AgentOS security key
    #[serde(default)]
    pub security_key: Option<String>,
    #[serde(default)]
    pub jwt_verification_key: Option<String>,
    /// Expose through a LoadBalancer instead of ClusterIP
    #[serde(default)]
    pub public: bool,
    #[serde(default = "default_cpu")]
    pub cpu: String,
    #[serde(default = "default_memory")]
    pub memory: String,
}

impl Config for RunnerConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["cluster", "namespace"];

    fn validate(&self) -> Result<()> {
        match (&self.agent, &self.team) {
            (None, None) => Err(ResourceError::Validation(
                "Either agent or team must be provided".into(),
            )),
            (Some(_), Some(_)) => Err(ResourceError::Validation(
                "Only one of agent or team can be provided, not both".into(),
            )),
            _ => Ok(()),
        }
    }

    fn dependencies(&self) -> DependencySet {
        DependencySet::new()
            .optional("agent", self.agent.as_ref())
            .optional("team", self.team.as_ref())
            .required("cluster", &self.cluster)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerSpec {
    pub name: String,
    pub namespace: String,
    pub deployed: DeployedSpec,
    pub replicas: u32,
    pub image: String,
    pub cpu: String,
    pub memory: String,
    /// Whether a security key was configured; the key itself is not recorded
    pub security_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerOutputs {
    pub spec: RunnerSpec,
    pub url: String,
    pub ready: bool,
}

pub struct Runner {
    name: String,
    config: RunnerConfig,
    connector: Arc<dyn KubeConnector>,
    poller: ConvergencePoller,
}

impl Runner {
    pub fn new(name: impl Into<String>, config: RunnerConfig) -> Self {
        Self::with_connector(name, config, Arc::new(KubectlConnector))
    }

    pub fn with_connector(
        name: impl Into<String>,
        config: RunnerConfig,
        connector: Arc<dyn KubeConnector>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            connector,
            poller: ConvergencePoller::from_settings(DEFAULT_POLL),
        }
    }

    /// Poller for the child deployment rollout
    pub fn with_poller(mut self, poller: ConvergencePoller) -> Self {
        self.poller = poller;
        self
    }

    pub fn with_settings(self, settings: &Settings) -> Self {
        let poller =
            ConvergencePoller::for_resource(settings, Self::PROVIDER, Self::RESOURCE, DEFAULT_POLL);
        self.with_poller(poller)
    }

    /// Name shared by the child deployment and service
    pub fn child_name(&self) -> String {
        format!("agno-{}", self.name)
    }

    fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("app".to_string(), self.child_name()),
            ("agno.ai/managed-by".to_string(), "pragma".to_string()),
        ])
    }

    fn env(&self, spec: &RunnerSpec) -> Result<BTreeMap<String, String>> {
        let mut env = BTreeMap::from([
            (SPEC_TYPE_ENV.to_string(), spec.deployed.spec_type().to_string()),
            (SPEC_JSON_ENV.to_string(), spec.deployed.to_json()?),
        ]);
        if let Some(key) = &self.config.security_key {
            env.insert("OS_SECURITY_KEY".into(), key.clone());
        }
        if let Some(key) = &self.config.jwt_verification_key {
            env.insert("JWT_VERIFICATION_KEY".into(), key.clone());
        }
        Ok(env)
    }

    fn health_probe(period_seconds: u32, timeout_seconds: u32, failure_threshold: u32) -> ProbeConfig {
        ProbeConfig {
            period_seconds,
            timeout_seconds,
            failure_threshold,
            ..ProbeConfig::http("/health", RUNNER_PORT)
        }
    }

    /// Child deployment. Delete, health and logs only need its identity, so
    /// they pass an empty env.
    pub fn deployment(&self, env: BTreeMap<String, String>) -> Deployment {
        let container = ContainerConfig {
            ports: vec![ContainerPortConfig {
                container_port: RUNNER_PORT,
                name: Some("http".into()),
                protocol: Default::default(),
            }],
            env,
            resources: Some(ResourceRequirementsConfig {
                cpu: Some(self.config.cpu.clone()),
                memory: Some(self.config.memory.clone()),
                cpu_limit: Some("1".into()),
                memory_limit: Some(self.config.memory.clone()),
            }),
            // slow imports at startup get 30s before liveness applies
            startup_probe: Some(Self::health_probe(2, 3, 15)),
            liveness_probe: Some(Self::health_probe(10, 5, 3)),
            readiness_probe: Some(Self::health_probe(5, 3, 3)),
            ..ContainerConfig::new("agno", &self.config.image)
        };

        let config = DeploymentConfig {
            cluster: self.config.cluster.clone(),
            namespace: self.config.namespace.clone(),
            replicas: self.config.replicas,
            selector: self.labels(),
            labels: Some(self.labels()),
            containers: vec![container],
            strategy: Strategy::RollingUpdate,
        };
        Deployment::with_connector(self.child_name(), config, self.connector.clone())
            .with_poller(self.poller.clone())
    }

    pub fn service(&self) -> Service {
        let config = ServiceConfig {
            cluster: self.config.cluster.clone(),
            namespace: self.config.namespace.clone(),
            service_type: if self.config.public {
                ServiceType::LoadBalancer
            } else {
                ServiceType::ClusterIP
            },
            selector: self.labels(),
            ports: vec![PortConfig {
                name: "http".into(),
                port: 80,
                target_port: RUNNER_PORT,
                protocol: Default::default(),
            }],
        };
        Service::with_connector(self.child_name(), config, self.connector.clone())
    }

    /// Server-side apply makes create and update the same operation
    async fn deploy(&self, ctx: &ResolutionContext) -> Result<RunnerOutputs> {
        let spec = self.build_spec(ctx)?;

        let deployment = self.deployment(self.env(&spec)?);
        deployment.config().validate()?;
        let rollout = deployment.create(ctx).await?;

        let service = self.service();
        service.config().validate()?;
        let exposed = service.create(ctx).await?;

        tracing::info!(
            "Runner {} serving {} {} at {}",
            self.name,
            spec.deployed.spec_type(),
            self.child_name(),
            exposed.url
        );
        Ok(RunnerOutputs {
            ready: rollout.ready_replicas >= self.config.replicas,
            spec,
            url: exposed.url,
        })
    }
}

#[async_trait]
impl Lifecycle for Runner {
    const PROVIDER: &'static str = "agno";
    const RESOURCE: &'static str = "runner";

    type Config = RunnerConfig;
    type Outputs = RunnerOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &RunnerConfig {
        &self.config
    }

    async fn create(&self, ctx: &ResolutionContext) -> Result<RunnerOutputs> {
        self.deploy(ctx).await
    }

    async fn update(
        &self,
        _previous: &RunnerConfig,
        _current: Option<&RunnerOutputs>,
        ctx: &ResolutionContext,
    ) -> Result<RunnerOutputs> {
        self.deploy(ctx).await
    }

    async fn delete(&self, ctx: &ResolutionContext) -> Result<()> {
        self.service().delete(ctx).await?;
        self.deployment(BTreeMap::new()).delete(ctx).await
    }
}

impl Compile for Runner {
    type Spec = RunnerSpec;
    type Runtime = Deployed;

    fn build_spec(&self, ctx: &ResolutionContext) -> Result<RunnerSpec> {
        let deployed = match (&self.config.agent, &self.config.team) {
            (Some(agent), _) => DeployedSpec::Agent(ctx.resolved(agent)?.spec),
            (None, Some(team)) => DeployedSpec::Team(ctx.resolved(team)?.spec),
            (None, None) => {
                return Err(ResourceError::Validation(
                    "Either agent or team must be provided".into(),
                ));
            }
        };

        Ok(RunnerSpec {
            name: self.child_name(),
            namespace: self.config.namespace.clone(),
            deployed,
            replicas: self.config.replicas,
            image: self.config.image.clone(),
            cpu: self.config.cpu.clone(),
            memory: self.config.memory.clone(),
            security_key: self.config.security_key.is_some(),
        })
    }

    fn from_spec(spec: &RunnerSpec) -> Result<Deployed> {
        Ok(Deployed::from_spec(&spec.deployed)?)
    }
}

#[async_trait]
impl HealthCheckable for Runner {
    async fn health(&self, ctx: &ResolutionContext) -> Result<HealthStatus> {
        self.deployment(BTreeMap::new()).health(ctx).await
    }
}

#[async_trait]
impl LogSource for Runner {
    async fn logs(
        &self,
        ctx: &ResolutionContext,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<LogStream> {
        self.deployment(BTreeMap::new()).logs(ctx, since, tail).await
    }
}
