use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use tally::api::types::{RunInput, RunRequest};
use tally::models::message::Message;
use tally::models::role::Role;
use tracing::{error, info};

use crate::error::ApiError;
use crate::records::{Run, RunStatus};
use crate::state::AppState;
use crate::store::new_id;

/// The first user message is the question for this run
fn user_text(input: &RunInput) -> Option<String> {
    input
        .messages
        .iter()
        .filter_map(Message::from_chat_json)
        .find(|message| message.role() == Role::User)
        .map(|message| message.text())
        .filter(|text| !text.is_empty())
}

async fn create_run(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    Json(request): Json<RunRequest>,
) -> Result<Json<Run>, ApiError> {
    let thread = state.threads.get(&thread_id)?;
    if let Some(assistant_id) = &request.assistant_id {
        state.assistants.get(assistant_id)?;
    }
    let text = user_text(&request.input)
        .ok_or_else(|| ApiError::BadRequest("No user message found".to_string()))?;

    let run_id = new_id("run");
    let created_at = Utc::now();
    info!(%run_id, %thread_id, "run started");

    let mut record = thread.lock().await;
    let (status, output, error, conversation) = match state
        .agent
        .reply(record.conversation.clone(), &text)
        .await
    {
        Ok(outcome) => (
            RunStatus::Success,
            Some(outcome.final_text),
            None,
            outcome.conversation,
        ),
        Err(failure) => {
            error!(%run_id, %thread_id, error = %failure.error, "run failed");
            (
                RunStatus::Error,
                None,
                Some(failure.error.to_string()),
                failure.conversation,
            )
        }
    };
    record.conversation = conversation;
    drop(record);

    let run = Run {
        run_id: run_id.clone(),
        thread_id,
        assistant_id: request.assistant_id,
        status,
        output,
        error,
        created_at,
        completed_at: Some(Utc::now()),
    };
    state.runs.create(&run_id, run.clone())?;
    info!(%run_id, status = ?run.status, "run finished");
    Ok(Json(run))
}

async fn get_run(
    State(state): State<AppState>,
    Path((thread_id, run_id)): Path<(String, String)>,
) -> Result<Json<Run>, ApiError> {
    state.threads.get(&thread_id)?;
    let run = state.runs.get(&run_id)?;
    if run.thread_id != thread_id {
        return Err(ApiError::NotFound(format!("Run {} not found", run_id)));
    }
    Ok(Json(run))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/threads/:thread_id/runs", post(create_run))
        .route("/threads/:thread_id/runs/:run_id", get(get_run))
        .with_state(state)
}
