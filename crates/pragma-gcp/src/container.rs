//! GKE control plane (container.googleapis.com)

use crate::client::{GcpCredentials, RestClient};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

const CONTAINER_API: &str = "https://container.googleapis.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReleaseChannel {
    Rapid,
    #[default]
    Regular,
    Stable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterAuth {
    #[serde(default)]
    pub cluster_ca_certificate: String,
}

/// Cluster as reported by the API; only the fields lifecycle code reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub name: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub master_auth: MasterAuth,
}

/// Body of a create request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRequest {
    pub name: String,
    pub network: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnetwork: Option<String>,
    pub release_channel: ReleaseChannelConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autopilot: Option<Autopilot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseChannelConfig {
    pub channel: ReleaseChannel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Autopilot {
    pub enabled: bool,
}

#[async_trait]
pub trait ClusterManager: Send + Sync {
    /// `parent` is `projects/{p}/locations/{l}`
    async fn create_cluster(&self, parent: &str, cluster: &ClusterRequest) -> Result<()>;

    /// `name` is the full cluster path. `None` when it does not exist.
    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>>;

    async fn set_release_channel(&self, name: &str, channel: ReleaseChannel) -> Result<()>;

    async fn delete_cluster(&self, name: &str) -> Result<()>;
}

pub struct RestClusterManager {
    client: RestClient,
}

impl RestClusterManager {
    pub fn new(credentials: GcpCredentials) -> Result<Self> {
        Self::with_base_url(CONTAINER_API, credentials)
    }

    pub fn with_base_url(base_url: &str, credentials: GcpCredentials) -> Result<Self> {
        Ok(Self {
            client: RestClient::new(base_url, credentials)?,
        })
    }
}

#[async_trait]
impl ClusterManager for RestClusterManager {
    async fn create_cluster(&self, parent: &str, cluster: &ClusterRequest) -> Result<()> {
        self.client
            .post(&format!("{parent}/clusters"), &json!({ "cluster": cluster }))
            .await?;
        Ok(())
    }

    async fn get_cluster(&self, name: &str) -> Result<Option<Cluster>> {
        self.client.get(name).await
    }

    async fn set_release_channel(&self, name: &str, channel: ReleaseChannel) -> Result<()> {
        let body = json!({
            "update": { "desiredReleaseChannel": { "channel": channel } }
        });
        self.client.put(name, &body).await?;
        Ok(())
    }

    async fn delete_cluster(&self, name: &str) -> Result<()> {
        self.client.delete(name).await
    }
}
