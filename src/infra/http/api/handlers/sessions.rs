//! Edit session handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::infra::http::api::models::session_response;
use crate::infra::http::api::state::ApiState;

pub async fn get_session(State(state): State<ApiState>, Path(id): Path<Uuid>) -> impl IntoResponse {
    Json(session_response(state.coordinator.status(id).await))
}

/// Discard the session and any unsaved draft.
pub async fn close_session(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    Json(session_response(state.coordinator.close(id).await))
}
