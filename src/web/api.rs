//! This module defines the HTTP endpoints over the log buffer.
use super::RelayState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::info;

/// Returns every buffered entry, oldest first.
#[axum::debug_handler]
pub async fn get_logs(State(state): State<RelayState>) -> impl IntoResponse {
    Json(state.buffer.get_all())
}

/// Empties the buffer.
#[axum::debug_handler]
pub async fn clear_logs(State(state): State<RelayState>) -> impl IntoResponse {
    state.buffer.clear();
    StatusCode::NO_CONTENT
}

/// Sample endpoint whose requests show up in the buffer.
pub async fn hello() -> &'static str {
    info!("Saying hello");
    "Hello World!"
}
