mod common;

use common::FakeClusters;
use pragma_core::{HealthState, LifecycleState, ProviderHarness, ResourceError};
use pragma_gcp::{Gke, GkeConfig, ReleaseChannel};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

fn config() -> GkeConfig {
    serde_json::from_value(serde_json::json!({
        "project_id": "proj",
        "region": "europe-west4",
        "name": "primary"
    }))
    .unwrap()
}

fn gke(config: GkeConfig, clusters: &std::sync::Arc<FakeClusters>) -> Gke {
    Gke::with_client("primary", config, clusters.clone())
}

#[tokio::test(start_paused = true)]
async fn test_create_polls_until_running() {
    let clusters = FakeClusters::new();
    clusters.script(&[Some("PROVISIONING"), Some("PROVISIONING"), Some("RUNNING")]);
    let harness = ProviderHarness::new();
    let start = Instant::now();

    let run = harness.create(gke(config(), &clusters)).await;

    let outputs = run.result.as_ref().unwrap();
    assert_eq!(outputs.status, "RUNNING");
    assert_eq!(outputs.endpoint, "34.90.0.1");
    assert_eq!(run.state(), LifecycleState::Ready);
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 3);

    // two 30s sleeps between three probes
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(60));
    assert!(elapsed < Duration::from_secs(61));

    let request = clusters.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.network, "default");
    assert!(request.autopilot.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_not_visible_right_after_create_keeps_polling() {
    let clusters = FakeClusters::new();
    clusters.script(&[None, Some("RUNNING")]);
    let harness = ProviderHarness::new();

    let run = harness.create(gke(config(), &clusters)).await;

    assert!(run.is_ok());
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_create_adopts_existing_cluster() {
    let clusters = FakeClusters::new();
    *clusters.create_conflict.lock().unwrap() = true;
    clusters.script(&[Some("RUNNING")]);
    let harness = ProviderHarness::new();

    let first = harness.create(gke(config(), &clusters)).await;
    let second = harness.create(gke(config(), &clusters)).await;

    assert_eq!(first.result.unwrap(), second.result.unwrap());
    assert_eq!(clusters.deletes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_state_fails_without_waiting() {
    let clusters = FakeClusters::new();
    clusters.script(&[Some("PROVISIONING"), Some("ERROR")]);
    let harness = ProviderHarness::new();

    let run = harness.create(gke(config(), &clusters)).await;

    assert!(matches!(
        run.result,
        Err(ResourceError::ConvergenceFailure { ref status, .. }) if status == "ERROR"
    ));
    assert_eq!(run.state(), LifecycleState::Failed);
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_never_running_times_out_after_budget() {
    let clusters = FakeClusters::new();
    clusters.script(&[Some("PROVISIONING")]);
    let harness = ProviderHarness::new();

    let run = harness.create(gke(config(), &clusters)).await;

    assert!(matches!(
        run.result,
        Err(ResourceError::ConvergenceTimeout { attempts: 40, .. })
    ));
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 40);
}

#[tokio::test]
async fn test_immutable_network_change_rejected() {
    let clusters = FakeClusters::new();
    let harness = ProviderHarness::new();
    let mut next = config();
    next.network = "vpc-2".into();

    let run = harness.update(gke(next, &clusters), &config(), None).await;

    assert_eq!(
        run.result.unwrap_err().to_string(),
        "Cannot change network; delete and recreate resource"
    );
    assert_eq!(clusters.writes(), 0);
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subnetwork_is_immutable() {
    let clusters = FakeClusters::new();
    let harness = ProviderHarness::new();
    let mut next = config();
    next.subnetwork = Some("nodes".into());

    let run = harness.update(gke(next, &clusters), &config(), None).await;

    assert!(matches!(
        run.result,
        Err(ResourceError::ImmutableField { ref field }) if field == "subnetwork"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_release_channel_change_updates_cluster() {
    let clusters = FakeClusters::new();
    clusters.script(&[Some("RECONCILING"), Some("RUNNING")]);
    let harness = ProviderHarness::new();
    let mut next = config();
    next.release_channel = ReleaseChannel::Stable;

    let run = harness.update(gke(next, &clusters), &config(), None).await;

    assert!(run.is_ok());
    assert_eq!(clusters.channel_updates.load(Ordering::SeqCst), 1);
    assert_eq!(
        *clusters.last_channel.lock().unwrap(),
        Some(ReleaseChannel::Stable)
    );
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rotated_token_is_not_a_change() {
    let clusters = FakeClusters::new();
    let harness = ProviderHarness::new();
    let mut previous = config();
    previous.credentials.access_token = "old".into();
    let mut next = config();
    next.credentials.access_token = "new".into();

    let action = harness.plan(gke(next, &clusters), Some(&previous), None);

    assert!(action.unwrap().changed.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_delete_waits_until_gone() {
    let clusters = FakeClusters::new();
    clusters.script(&[Some("STOPPING"), Some("STOPPING"), None]);
    let harness = ProviderHarness::new();

    let run = harness.delete(gke(config(), &clusters), None).await;

    assert!(run.is_ok());
    assert_eq!(run.state(), LifecycleState::Uncreated);
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_delete_of_missing_cluster_succeeds() {
    let clusters = FakeClusters::new();
    *clusters.delete_missing.lock().unwrap() = true;
    let harness = ProviderHarness::new();

    let run = harness.delete(gke(config(), &clusters), None).await;

    assert!(run.is_ok());
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_health_mapping() {
    let clusters = FakeClusters::new();
    let harness = ProviderHarness::new();

    clusters.script(&[Some("RUNNING")]);
    let status = harness.health(gke(config(), &clusters)).await.unwrap();
    assert_eq!(status.status, HealthState::Healthy);

    clusters.script(&[Some("RECONCILING")]);
    let status = harness.health(gke(config(), &clusters)).await.unwrap();
    assert_eq!(status.status, HealthState::Degraded);

    clusters.script(&[None]);
    let status = harness.health(gke(config(), &clusters)).await.unwrap();
    assert_eq!(status.status, HealthState::Unhealthy);
    assert_eq!(status.message.as_deref(), Some("Cluster not found"));
}

#[tokio::test]
async fn test_logs_yield_single_sentinel() {
    use futures_util::StreamExt;

    let clusters = FakeClusters::new();
    let harness = ProviderHarness::new();

    let entries: Vec<_> = harness
        .logs(gke(config(), &clusters), None, 100)
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(entries.len(), 1);
    assert_eq!(clusters.gets.load(Ordering::SeqCst), 0);
}
