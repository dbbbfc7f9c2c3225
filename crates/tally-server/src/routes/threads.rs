use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tally::api::types::{ThreadRequest, ThreadState, ThreadValues};
use tracing::info;

use crate::error::ApiError;
use crate::records::{Thread, ThreadRecord};
use crate::state::AppState;
use crate::store::new_id;

async fn create_thread(
    State(state): State<AppState>,
    request: Option<Json<ThreadRequest>>,
) -> Result<Json<Thread>, ApiError> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let thread = Thread {
        thread_id: new_id("thread"),
        metadata: request.metadata.unwrap_or_else(|| json!({})),
        created_at: Utc::now(),
    };

    state
        .threads
        .create(&thread.thread_id, ThreadRecord::shared(thread.clone()))?;
    info!(thread_id = %thread.thread_id, "thread created");
    Ok(Json(thread))
}

async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Thread>, ApiError> {
    let record = state.threads.get(&thread_id)?;
    let thread = record.lock().await.thread.clone();
    Ok(Json(thread))
}

async fn delete_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.threads.delete(&thread_id)?;
    Ok(Json(json!({ "thread_id": thread_id, "deleted": true })))
}

/// The thread's conversation in the wire format
async fn get_thread_state(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ThreadState>, ApiError> {
    let record = state.threads.get(&thread_id)?;
    let record = record.lock().await;
    Ok(Json(ThreadState {
        values: ThreadValues {
            messages: record.conversation.clone(),
        },
    }))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/threads", post(create_thread))
        .route("/threads/:thread_id", get(get_thread).delete(delete_thread))
        .route("/threads/:thread_id/state", get(get_thread_state))
        .with_state(state)
}
