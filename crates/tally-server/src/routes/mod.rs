// Export route modules
pub mod assistants;
pub mod auth;
pub mod health;
pub mod runs;
pub mod threads;

use crate::state::AppState;
use axum::{middleware, Router};

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    let api = Router::new()
        .merge(assistants::routes(state.clone()))
        .merge(threads::routes(state.clone()))
        .merge(runs::routes(state.clone()))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    Router::new().merge(health::routes(state)).merge(api)
}
