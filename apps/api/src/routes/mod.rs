pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::generation::handlers as generation;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/variants", get(generation::handle_list_variants))
        // Session API
        .route("/api/v1/sessions", post(session::handle_create_session))
        .route("/api/v1/sessions/:id", delete(session::handle_delete_session))
        .route(
            "/api/v1/sessions/:id/generate",
            post(generation::handle_generate),
        )
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
