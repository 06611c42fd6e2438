use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use pragma_gcp::container::{ClusterRequest, ReleaseChannelConfig};
use pragma_gcp::{ClusterManager, GcpCredentials, ReleaseChannel, RestClusterManager};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const CLUSTER: &str = "/projects/proj/locations/europe-west4/clusters/primary";

async fn get_cluster(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let authorized = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        == Some("Bearer ya29.test");
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"message": "missing token"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "name": "primary",
            "status": "RUNNING",
            "endpoint": "34.90.0.1",
            "location": "europe-west4",
            "masterAuth": {"clusterCaCertificate": "Y2E="}
        })),
    )
}

async fn missing() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": {"code": 404, "message": "Not found: cluster"}})),
    )
}

async fn conflict() -> (StatusCode, Json<Value>) {
    (
        StatusCode::CONFLICT,
        Json(json!({"error": {"code": 409, "message": "Already exists: primary"}})),
    )
}

async fn serve() -> String {
    let app = Router::new()
        .route(CLUSTER, get(get_cluster).delete(missing))
        .route(
            "/projects/proj/locations/europe-west4/clusters/absent",
            get(missing),
        )
        .route(
            "/projects/proj/locations/europe-west4/clusters",
            post(conflict),
        );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn manager(base: &str, token: &str) -> RestClusterManager {
    RestClusterManager::with_base_url(base, GcpCredentials::new(token)).unwrap()
}

#[tokio::test]
async fn test_get_sends_bearer_and_parses_cluster() {
    let base = serve().await;

    let cluster = manager(&base, "ya29.test")
        .get_cluster(CLUSTER)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cluster.status, "RUNNING");
    assert_eq!(cluster.master_auth.cluster_ca_certificate, "Y2E=");
}

#[tokio::test]
async fn test_missing_cluster_is_none() {
    let base = serve().await;

    let cluster = manager(&base, "ya29.test")
        .get_cluster("projects/proj/locations/europe-west4/clusters/absent")
        .await
        .unwrap();

    assert!(cluster.is_none());
}

#[tokio::test]
async fn test_error_statuses_are_classified() {
    let base = serve().await;
    let clusters = manager(&base, "ya29.test");

    let request = ClusterRequest {
        name: "primary".into(),
        network: "default".into(),
        subnetwork: None,
        release_channel: ReleaseChannelConfig {
            channel: ReleaseChannel::Regular,
        },
        autopilot: None,
    };
    let err = clusters
        .create_cluster("projects/proj/locations/europe-west4", &request)
        .await
        .unwrap_err();
    assert!(err.is_already_exists());

    let err = clusters.delete_cluster(CLUSTER).await.unwrap_err();
    assert!(err.is_not_found());

    let err = manager(&base, "wrong")
        .get_cluster(CLUSTER)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing token"));
}
