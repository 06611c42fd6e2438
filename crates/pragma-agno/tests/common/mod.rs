#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::{ProviderHarness, ResourceKey};
use pragma_gcp::GkeOutputs;
use pragma_kubernetes::{KubeApi, KubeConnector, KubeError, ObjectRef, Result};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER: &str = "gcp/gke/primary";

/// Cluster where every deployment reports `ready` ready replicas
pub struct FakeKube {
    pub applied: Mutex<Vec<Value>>,
    pub deleted: Mutex<Vec<String>>,
    pub gets: AtomicU32,
    pub ready: Mutex<Option<u32>>,
    pub pods: Mutex<Vec<String>>,
}

impl FakeKube {
    pub fn ready(replicas: u32) -> Arc<Self> {
        Arc::new(Self {
            applied: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            gets: AtomicU32::new(0),
            ready: Mutex::new(Some(replicas)),
            pods: Mutex::new(Vec::new()),
        })
    }

    /// Deployments are never found
    pub fn empty() -> Arc<Self> {
        let kube = Self::ready(0);
        *kube.ready.lock().unwrap() = None;
        kube
    }

    pub fn applied_kind(&self, kind: &str) -> Vec<Value> {
        self.applied
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m["kind"] == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl KubeApi for FakeKube {
    async fn apply(&self, manifest: &Value) -> Result<Value> {
        self.applied.lock().unwrap().push(manifest.clone());
        let mut applied = manifest.clone();
        if applied["kind"] == "Service" {
            applied["spec"]["clusterIP"] = "10.96.0.40".into();
        }
        Ok(applied)
    }

    async fn get(&self, _object: &ObjectRef) -> Result<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.ready.lock().unwrap().map(|ready| {
            json!({
                "spec": {"replicas": ready},
                "status": {"readyReplicas": ready, "availableReplicas": ready}
            })
        }))
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        self.deleted.lock().unwrap().push(object.to_string());
        Ok(())
    }

    async fn list_pods(
        &self,
        _namespace: &str,
        _selector: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn pod_logs(
        &self,
        _namespace: &str,
        pod: &str,
        _since: Option<DateTime<Utc>>,
        _tail: usize,
    ) -> Result<String> {
        Err(KubeError::NotFound(pod.to_string()))
    }
}

pub struct FakeConnector {
    pub kube: Arc<FakeKube>,
}

impl FakeConnector {
    pub fn new(kube: &Arc<FakeKube>) -> Arc<Self> {
        Arc::new(Self { kube: kube.clone() })
    }
}

impl KubeConnector for FakeConnector {
    fn connect(&self, _cluster: &GkeOutputs) -> Result<Arc<dyn KubeApi>> {
        Ok(self.kube.clone())
    }
}

pub fn cluster_outputs() -> GkeOutputs {
    GkeOutputs {
        name: "primary".into(),
        endpoint: "34.90.0.1".into(),
        cluster_ca_certificate: "Y2E=".into(),
        location: "europe-west4".into(),
        status: "RUNNING".into(),
    }
}

pub async fn harness() -> ProviderHarness {
    let harness = ProviderHarness::new();
    harness
        .seed(&ResourceKey::parse(CLUSTER).unwrap(), &cluster_outputs())
        .await
        .unwrap();
    harness
}
