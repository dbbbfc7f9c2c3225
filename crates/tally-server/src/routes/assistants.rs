use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tally::api::types::AssistantRequest;
use tracing::info;

use crate::error::ApiError;
use crate::records::{Assistant, GRAPH_ID};
use crate::state::AppState;
use crate::store::new_id;

const DEFAULT_NAME: &str = "Math Assistant";

/// Every assistant runs the agent loop; other graphs are refused
fn check_graph_id(graph_id: Option<&str>) -> Result<(), ApiError> {
    match graph_id {
        Some(graph_id) if graph_id != GRAPH_ID => Err(ApiError::BadRequest(format!(
            "Unknown graph_id '{}', this server runs '{}'",
            graph_id, GRAPH_ID
        ))),
        _ => Ok(()),
    }
}

async fn create_assistant(
    State(state): State<AppState>,
    request: Option<Json<AssistantRequest>>,
) -> Result<Json<Assistant>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    check_graph_id(request.graph_id.as_deref())?;

    let now = Utc::now();
    let assistant = Assistant {
        assistant_id: new_id("asst"),
        name: request.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
        graph_id: GRAPH_ID.to_string(),
        config: request.config.unwrap_or_else(|| json!({})),
        metadata: request.metadata.unwrap_or_else(|| json!({})),
        created_at: now,
        updated_at: now,
    };

    state
        .assistants
        .create(&assistant.assistant_id, assistant.clone())?;
    info!(assistant_id = %assistant.assistant_id, "assistant created");
    Ok(Json(assistant))
}

/// Oldest first
async fn list_assistants(State(state): State<AppState>) -> Result<Json<Vec<Assistant>>, ApiError> {
    let mut assistants = state.assistants.list()?;
    assistants.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.assistant_id.cmp(&b.assistant_id))
    });
    Ok(Json(assistants))
}

async fn get_assistant(
    State(state): State<AppState>,
    Path(assistant_id): Path<String>,
) -> Result<Json<Assistant>, ApiError> {
    Ok(Json(state.assistants.get(&assistant_id)?))
}

async fn update_assistant(
    State(state): State<AppState>,
    Path(assistant_id): Path<String>,
    Json(request): Json<AssistantRequest>,
) -> Result<Json<Assistant>, ApiError> {
    check_graph_id(request.graph_id.as_deref())?;
    let mut assistant = state.assistants.get(&assistant_id)?;

    if let Some(name) = request.name {
        assistant.name = name;
    }
    if let Some(config) = request.config {
        assistant.config = config;
    }
    if let Some(metadata) = request.metadata {
        assistant.metadata = metadata;
    }
    assistant.updated_at = Utc::now();

    state.assistants.put(&assistant_id, assistant.clone())?;
    info!(%assistant_id, "assistant updated");
    Ok(Json(assistant))
}

async fn delete_assistant(
    State(state): State<AppState>,
    Path(assistant_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.assistants.delete(&assistant_id)?;
    Ok(Json(json!({ "assistant_id": assistant_id, "deleted": true })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/assistants", get(list_assistants).post(create_assistant))
        .route(
            "/assistants/:assistant_id",
            get(get_assistant)
                .patch(update_assistant)
                .delete(delete_assistant),
        )
        .with_state(state)
}
