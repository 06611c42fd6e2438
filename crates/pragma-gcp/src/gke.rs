//! GKE cluster resource (`gcp/gke`)

use crate::client::GcpCredentials;
use crate::container::{
    Autopilot, Cluster, ClusterManager, ClusterRequest, ReleaseChannel, ReleaseChannelConfig,
    RestClusterManager,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::health::{self, LogStream};
use pragma_core::{
    Config, ConvergencePoller, HealthCheckable, HealthStatus, Lifecycle, LogSource, PollSettings,
    ResolutionContext, ResourceError, Result, Settings, Verdict,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 40 × 30s: twenty minutes for a cluster to come up or go away
pub const DEFAULT_POLL: PollSettings = PollSettings::new(30, 40);

const TERMINAL_STATES: [&str; 3] = ["ERROR", "STOPPING", "DEGRADED"];

fn default_true() -> bool {
    true
}

fn default_network() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GkeConfig {
    pub project_id: String,
    #[serde(default)]
    pub credentials: GcpCredentials,
    pub region: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub autopilot: bool,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub subnetwork: Option<String>,
    #[serde(default)]
    pub release_channel: ReleaseChannel,
}

impl Config for GkeConfig {
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[
        "project_id",
        "region",
        "name",
        "network",
        "subnetwork",
        "autopilot",
    ];

    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("project_id", &self.project_id),
            ("region", &self.region),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(ResourceError::Validation(format!("{field} must not be empty")));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GkeOutputs {
    pub name: String,
    pub endpoint: String,
    pub cluster_ca_certificate: String,
    pub location: String,
    pub status: String,
}

impl From<Cluster> for GkeOutputs {
    fn from(cluster: Cluster) -> Self {
        Self {
            name: cluster.name,
            endpoint: cluster.endpoint,
            cluster_ca_certificate: cluster.master_auth.cluster_ca_certificate,
            location: cluster.location,
            status: cluster.status,
        }
    }
}

fn running(cluster: &Cluster) -> Verdict {
    match cluster.status.as_str() {
        "RUNNING" => Verdict::Ready,
        s if TERMINAL_STATES.contains(&s) => Verdict::Failed(match &cluster.status_message {
            Some(msg) if !msg.is_empty() => format!("{s}: {msg}"),
            _ => s.to_string(),
        }),
        _ => Verdict::Pending,
    }
}

pub struct Gke {
    name: String,
    config: GkeConfig,
    client: Arc<dyn ClusterManager>,
    poller: ConvergencePoller,
}

impl Gke {
    pub fn new(name: impl Into<String>, config: GkeConfig) -> Result<Self> {
        let client = RestClusterManager::new(config.credentials.clone())?;
        Ok(Self::with_client(name, config, Arc::new(client)))
    }

    pub fn with_client(
        name: impl Into<String>,
        config: GkeConfig,
        client: Arc<dyn ClusterManager>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            client,
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

    fn parent_path(&self) -> String {
        format!(
            "projects/{}/locations/{}",
            self.config.project_id, self.config.region
        )
    }

    fn cluster_path(&self) -> String {
        format!("{}/clusters/{}", self.parent_path(), self.config.name)
    }

    fn cluster_request(&self) -> ClusterRequest {
        ClusterRequest {
            name: self.config.name.clone(),
            network: self.config.network.clone(),
            subnetwork: self.config.subnetwork.clone(),
            release_channel: ReleaseChannelConfig {
                channel: self.config.release_channel,
            },
            autopilot: self.config.autopilot.then_some(Autopilot { enabled: true }),
        }
    }

    async fn wait_for_running(&self) -> Result<Cluster> {
        let client = self.client.as_ref();
        let path = self.cluster_path();
        let path = path.as_str();
        self.poller
            .wait_until(
                path,
                move || async move { client.get_cluster(path).await.map_err(ResourceError::from) },
                running,
            )
            .await
    }

    async fn wait_for_deletion(&self) -> Result<()> {
        let client = self.client.as_ref();
        let path = self.cluster_path();
        let path = path.as_str();
        self.poller
            .wait_until_gone(path, move || async move {
                client.get_cluster(path).await.map_err(ResourceError::from)
            })
            .await
    }
}

#[async_trait]
impl Lifecycle for Gke {
    const PROVIDER: &'static str = "gcp";
    const RESOURCE: &'static str = "gke";

    type Config = GkeConfig;
    type Outputs = GkeOutputs;

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &GkeConfig {
        &self.config
    }

    async fn create(&self, _ctx: &ResolutionContext) -> Result<GkeOutputs> {
        match self
            .client
            .create_cluster(&self.parent_path(), &self.cluster_request())
            .await
        {
            Ok(()) => tracing::info!("Requested cluster {}", self.cluster_path()),
            Err(e) if e.is_already_exists() => {
                tracing::warn!("Cluster {} already exists, adopting it", self.cluster_path());
            }
            Err(e) => return Err(e.into()),
        }

        Ok(self.wait_for_running().await?.into())
    }

    async fn update(
        &self,
        previous: &GkeConfig,
        _current: Option<&GkeOutputs>,
        _ctx: &ResolutionContext,
    ) -> Result<GkeOutputs> {
        if previous.release_channel != self.config.release_channel {
            tracing::info!(
                "Moving {} to release channel {:?}",
                self.cluster_path(),
                self.config.release_channel
            );
            self.client
                .set_release_channel(&self.cluster_path(), self.config.release_channel)
                .await?;
        }
        Ok(self.wait_for_running().await?.into())
    }

    async fn delete(&self, _ctx: &ResolutionContext) -> Result<()> {
        match self.client.delete_cluster(&self.cluster_path()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::warn!("Cluster {} already deleted", self.cluster_path());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
        self.wait_for_deletion().await
    }
}

#[async_trait]
impl HealthCheckable for Gke {
    async fn health(&self, _ctx: &ResolutionContext) -> Result<HealthStatus> {
        let Some(cluster) = self.client.get_cluster(&self.cluster_path()).await? else {
            return Ok(HealthStatus::unhealthy("Cluster not found"));
        };
        let status = match cluster.status.as_str() {
            "RUNNING" => HealthStatus::healthy("Cluster is running"),
            "PROVISIONING" | "RECONCILING" => {
                HealthStatus::degraded(format!("Cluster is {}", cluster.status.to_lowercase()))
            }
            other => HealthStatus::unhealthy(format!("Cluster state: {other}")),
        };
        Ok(status
            .with_detail("status", cluster.status.clone())
            .with_detail("location", cluster.location))
    }
}

#[async_trait]
impl LogSource for Gke {
    async fn logs(
        &self,
        _ctx: &ResolutionContext,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> Result<LogStream> {
        Ok(health::sentinel(
            "GKE clusters do not produce logs; query workloads instead",
        ))
    }
}
