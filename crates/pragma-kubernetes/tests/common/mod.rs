#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pragma_core::{ProviderHarness, ResourceKey};
use pragma_gcp::GkeOutputs;
use pragma_kubernetes::{KubeApi, KubeConnector, KubeError, ObjectRef, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const CLUSTER: &str = "gcp/gke/primary";

/// In-memory cluster: records applies, replays scripted `get` results
#[derive(Default)]
pub struct FakeKube {
    pub applied: Mutex<Vec<Value>>,
    pub gets: AtomicU32,
    pub deletes: AtomicU32,
    pub delete_missing: Mutex<bool>,
    pub pods: Mutex<Vec<String>>,
    /// pod -> log text; pods missing here fail to read
    pub pod_logs: Mutex<HashMap<String, String>>,
    pub log_reads: AtomicU32,
    script: Mutex<VecDeque<Option<Value>>>,
}

impl FakeKube {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Observed objects in order; the last one repeats
    pub fn script(&self, observed: Vec<Option<Value>>) {
        *self.script.lock().unwrap() = observed.into();
    }

    pub fn applies(&self) -> usize {
        self.applied.lock().unwrap().len()
    }

    pub fn last_applied(&self) -> Value {
        self.applied.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl KubeApi for FakeKube {
    async fn apply(&self, manifest: &Value) -> Result<Value> {
        self.applied.lock().unwrap().push(manifest.clone());
        let mut applied = manifest.clone();
        if applied["kind"] == "Service" {
            applied["spec"]["clusterIP"] = "10.96.0.12".into();
        }
        Ok(applied)
    }

    async fn get(&self, _object: &ObjectRef) -> Result<Option<Value>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let mut script = self.script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front().flatten()
        } else {
            script.front().cloned().flatten()
        };
        Ok(next)
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if *self.delete_missing.lock().unwrap() {
            return Err(KubeError::NotFound(object.to_string()));
        }
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
        self.log_reads.fetch_add(1, Ordering::SeqCst);
        self.pod_logs
            .lock()
            .unwrap()
            .get(pod)
            .cloned()
            .ok_or_else(|| KubeError::CommandFailed {
                command: "logs".into(),
                stderr: format!("container in pod {pod} is waiting to start"),
            })
    }
}

pub struct FakeConnector {
    pub kube: Arc<FakeKube>,
    pub connects: AtomicU32,
}

impl FakeConnector {
    pub fn new(kube: Arc<FakeKube>) -> Arc<Self> {
        Arc::new(Self {
            kube,
            connects: AtomicU32::new(0),
        })
    }
}

impl KubeConnector for FakeConnector {
    fn connect(&self, _cluster: &GkeOutputs) -> Result<Arc<dyn KubeApi>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
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

/// Harness with the GKE cluster outputs already published
pub async fn harness() -> ProviderHarness {
    let harness = ProviderHarness::new();
    harness
        .seed(&ResourceKey::parse(CLUSTER).unwrap(), &cluster_outputs())
        .await
        .unwrap();
    harness
}

pub fn deployment_status(replicas: u32, ready: u32) -> Option<Value> {
    Some(serde_json::json!({
        "spec": {"replicas": replicas},
        "status": {"readyReplicas": ready, "availableReplicas": ready}
    }))
}
