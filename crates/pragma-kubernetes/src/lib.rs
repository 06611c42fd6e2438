//! Kubernetes resources on GKE clusters
//!
//! Resources reach the cluster through a [`KubeApi`] obtained from a
//! [`KubeConnector`]. The default connector drives `kubectl` with a
//! kubeconfig generated from the resolved cluster outputs.

pub mod api;
pub mod configmap;
pub mod deployment;
pub mod error;
pub mod kubeconfig;
pub mod kubectl;
pub mod namespace;
pub mod secret;
pub mod service;

pub use api::{KubeApi, KubeConnector, ObjectRef};
pub use configmap::{ConfigMap, ConfigMapConfig, ConfigMapOutputs};
pub use deployment::{
    ContainerConfig, ContainerPortConfig, Deployment, DeploymentConfig, DeploymentOutputs,
    HttpGetConfig, ProbeConfig, ResourceRequirementsConfig, Strategy,
};
pub use error::{KubeError, Result};
pub use kubeconfig::Kubeconfig;
pub use kubectl::{Kubectl, KubectlConnector};
pub use namespace::{Namespace, NamespaceConfig, NamespaceOutputs};
pub use secret::{Secret, SecretConfig, SecretOutputs};
pub use service::{PortConfig, Service, ServiceConfig, ServiceOutputs, ServiceType};
