mod common;

use common::{CLUSTER, FakeConnector, FakeKube, harness};
use futures_util::StreamExt;
use pragma_core::{HealthState, LifecycleState, ProviderHarness};
use pragma_kubernetes::{Namespace, NamespaceConfig, Service, ServiceConfig};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn config() -> NamespaceConfig {
    serde_json::from_value(json!({
        "cluster": CLUSTER,
        "labels": {"team": "agents"}
    }))
    .unwrap()
}

fn namespace(kube: &Arc<FakeKube>) -> Namespace {
    Namespace::with_connector("agents", config(), FakeConnector::new(kube.clone()))
}

fn phase(phase: &str) -> Option<Value> {
    Some(json!({"status": {"phase": phase}}))
}

#[tokio::test(start_paused = true)]
async fn test_create_waits_for_active() {
    let kube = FakeKube::new();
    kube.script(vec![None, phase("Active")]);
    let harness = harness().await;

    let run = harness.create(namespace(&kube)).await;

    assert_eq!(run.result.unwrap().phase, "Active");
    assert_eq!(kube.last_applied()["metadata"]["labels"]["team"], "agents");
    assert_eq!(kube.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_until_absent() {
    let kube = FakeKube::new();
    kube.script(vec![phase("Terminating"), phase("Terminating"), None]);
    let harness = harness().await;

    let run = harness.delete(namespace(&kube), None).await;

    assert!(run.is_ok());
    assert_eq!(run.state(), LifecycleState::Uncreated);
    assert_eq!(kube.gets.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_delete_of_missing_namespace_does_not_poll() {
    let kube = FakeKube::new();
    *kube.delete_missing.lock().unwrap() = true;
    let harness = harness().await;

    let run = harness.delete(namespace(&kube), None).await;

    assert!(run.is_ok());
    assert_eq!(kube.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_delete_after_cluster_is_gone() {
    let kube = FakeKube::new();
    let harness = ProviderHarness::new();

    let run = harness.delete(namespace(&kube), None).await;

    assert!(run.is_ok());
    assert_eq!(run.state(), LifecycleState::Uncreated);
    assert_eq!(kube.deletes.load(Ordering::SeqCst), 0);
    assert_eq!(kube.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_reports_phase() {
    let kube = FakeKube::new();
    let harness = harness().await;

    kube.script(vec![phase("Active")]);
    let status = harness.health(namespace(&kube)).await.unwrap();
    assert_eq!(status.status, HealthState::Healthy);

    kube.script(vec![phase("Terminating")]);
    let status = harness.health(namespace(&kube)).await.unwrap();
    assert_eq!(status.status, HealthState::Degraded);
    assert_eq!(status.details["phase"], "Terminating");
}

#[tokio::test]
async fn test_logs_yield_sentinel() {
    let kube = FakeKube::new();
    let harness = harness().await;

    let entries: Vec<_> = harness
        .logs(namespace(&kube), None, 10)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].message, "Namespaces do not produce logs");
}

#[tokio::test]
async fn test_service_outputs_cluster_ip() {
    let kube = FakeKube::new();
    let harness = harness().await;
    let config: ServiceConfig = serde_json::from_value(json!({
        "cluster": CLUSTER,
        "namespace": "agents",
        "selector": {"app": "agno-support"},
        "ports": [{"name": "http", "port": 80, "target_port": 8000}]
    }))
    .unwrap();

    let run = harness
        .create(Service::with_connector(
            "agno-support",
            config,
            FakeConnector::new(kube.clone()),
        ))
        .await;

    let outputs = run.result.unwrap();
    assert_eq!(outputs.cluster_ip.as_deref(), Some("10.96.0.12"));
    assert_eq!(outputs.url, "http://agno-support.agents.svc.cluster.local");
    assert_eq!(kube.gets.load(Ordering::SeqCst), 0);
}
