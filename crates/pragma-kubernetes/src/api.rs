//! Control-plane seam for Kubernetes resources

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::{Dependency, ResolutionContext};
use pragma_gcp::GkeOutputs;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Object reference: kind plus optional namespace (cluster scoped when `None`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectRef {
    pub fn namespaced(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster_scoped(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            namespace: None,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

#[async_trait]
pub trait KubeApi: Send + Sync {
    /// Server-side apply; creates or updates. Returns the applied object.
    async fn apply(&self, manifest: &Value) -> Result<Value>;

    /// `None` when the object does not exist
    async fn get(&self, object: &ObjectRef) -> Result<Option<Value>>;

    /// Fails with `NotFound` when the object is already gone
    async fn delete(&self, object: &ObjectRef) -> Result<()>;

    /// Names of pods matching every selector label
    async fn list_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<String>>;

    /// Raw log text of one pod, each line prefixed with its RFC 3339 timestamp
    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<String>;
}

/// Opens a [`KubeApi`] against a resolved GKE cluster
pub trait KubeConnector: Send + Sync {
    fn connect(&self, cluster: &GkeOutputs) -> Result<Arc<dyn KubeApi>>;
}

/// Whether the cluster behind `cluster` no longer exists in this pass.
/// Everything on a deleted cluster is deleted with it.
pub fn cluster_gone(
    ctx: &ResolutionContext,
    cluster: &Dependency<GkeOutputs>,
    object: &ObjectRef,
) -> bool {
    if ctx.is_resolved(cluster.key()) {
        return false;
    }
    tracing::warn!(
        "Cluster {} is gone; treating {} as deleted",
        cluster.id(),
        object
    );
    true
}

/// Selector in `kubectl -l` form
pub fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
