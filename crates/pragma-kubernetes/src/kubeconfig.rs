//! Kubeconfig generation for GKE clusters
//!
//! Authentication goes through `gke-gcloud-auth-plugin`, so the file holds
//! no secrets: only the endpoint and the cluster CA.

use crate::error::Result;
use pragma_gcp::GkeOutputs;
use serde::{Deserialize, Serialize};

const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";
const AUTH_PLUGIN: &str = "gke-gcloud-auth-plugin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub clusters: Vec<NamedCluster>,
    pub users: Vec<NamedUser>,
    pub contexts: Vec<NamedContext>,
    pub current_context: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: ClusterEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClusterEntry {
    pub server: String,
    pub certificate_authority_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    pub user: UserEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserEntry {
    pub exec: ExecConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    pub api_version: String,
    pub command: String,
    pub provide_cluster_info: bool,
    pub install_hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: ContextEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextEntry {
    pub cluster: String,
    pub user: String,
}

impl Kubeconfig {
    pub fn for_gke(cluster: &GkeOutputs) -> Self {
        let name = format!("gke_{}_{}", cluster.location, cluster.name);
        let server = if cluster.endpoint.starts_with("https://") {
            cluster.endpoint.clone()
        } else {
            format!("https://{}", cluster.endpoint)
        };

        Self {
            api_version: "v1".into(),
            kind: "Config".into(),
            clusters: vec![NamedCluster {
                name: name.clone(),
                cluster: ClusterEntry {
                    server,
                    certificate_authority_data: cluster.cluster_ca_certificate.clone(),
                },
            }],
            users: vec![NamedUser {
                name: name.clone(),
                user: UserEntry {
                    exec: ExecConfig {
                        api_version: EXEC_API_VERSION.into(),
                        command: AUTH_PLUGIN.into(),
                        provide_cluster_info: true,
                        install_hint: "Install gke-gcloud-auth-plugin: \
                                       gcloud components install gke-gcloud-auth-plugin"
                            .into(),
                    },
                },
            }],
            contexts: vec![NamedContext {
                name: name.clone(),
                context: ContextEntry {
                    cluster: name.clone(),
                    user: name.clone(),
                },
            }],
            current_context: name,
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
