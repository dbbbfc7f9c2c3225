use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::error::ApiError;
use crate::state::AppState;

/// The key a request presents, as `Authorization: Bearer <key>` or `x-api-key: <key>`
fn presented_key(request: &Request) -> Option<&str> {
    let headers = request.headers();
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-api-key").and_then(|value| value.to_str().ok()))
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(expected) = &state.api_key {
        if presented_key(&request) != Some(expected.as_str()) {
            return Err(ApiError::Unauthorized("Invalid or missing API key".to_string()));
        }
    }
    Ok(next.run(request).await)
}
