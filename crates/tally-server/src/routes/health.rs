use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::warn;

use crate::state::{AppState, ToolSource};

pub const SERVICE_NAME: &str = "tallyd";

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": SERVICE_NAME,
        "tool_provider": state.tools.describe(),
    }))
}

/// Check that the tool provider is reachable
async fn test_tools(State(state): State<AppState>) -> impl IntoResponse {
    match &state.tools {
        ToolSource::Local => (
            StatusCode::OK,
            Json(json!({
                "tool_provider": "local",
                "status": "connected",
                "tools": state.agent.registry().names(),
            })),
        ),
        ToolSource::Remote(client) => match client.health().await {
            Ok(response) => (
                StatusCode::OK,
                Json(json!({
                    "tool_provider": client.host(),
                    "status": "connected",
                    "response": response,
                })),
            ),
            Err(e) => {
                warn!(host = client.host(), error = %e, "tool provider health check failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "tool_provider": client.host(),
                        "status": "error",
                        "error": e.to_string(),
                    })),
                )
            }
        },
    }
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/test-tools", get(test_tools))
        .with_state(state)
}
