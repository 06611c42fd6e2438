//! HTTP surface of a runner container

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use pragma_agno::Deployed;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Clone)]
pub struct AppState {
    deployed: Arc<Deployed>,
}

pub fn create_router(deployed: Deployed) -> Router {
    let state = AppState {
        deployed: Arc::new(deployed),
    };
    Router::new()
        .route("/health", get(health))
        .route("/spec", get(spec))
        .with_state(state)
}

/// Probe target for the startup, liveness and readiness checks
async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// The rebuilt graph, credentials omitted
async fn spec(State(state): State<AppState>) -> Json<Deployed> {
    Json(state.deployed.as_ref().clone())
}

pub async fn serve(deployed: Deployed, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    tracing::info!(address = %addr, "Starting runner for {}", deployed.name());

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, create_router(deployed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pragma_agno::DeployedSpec;

    fn deployed() -> Deployed {
        let spec = DeployedSpec::decode(
            "agent",
            r#"{"name": "support", "model_spec": {"type": "openai", "id": "gpt-4o", "api_key": "sk-secret"}}"#,
        )
        .unwrap();
        Deployed::from_spec(&spec).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health().await;
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_spec_hides_credentials() {
        let state = AppState {
            deployed: Arc::new(deployed()),
        };
        let Json(deployed) = spec(State(state)).await;
        let body = serde_json::to_value(&deployed).unwrap();
        assert_eq!(body["type"], "agent");
        assert_eq!(body["graph"]["model"]["id"], "gpt-4o");
        assert!(!body.to_string().contains("sk-secret"));
    }
}
