//! Block catalog and editor handlers

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tessera_api_types::{BlockPreviewRequest, BlockPreviewResponse, FieldAffordanceRequest};

use super::editor_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    BlockCategoryResponse, BlockTypeResponse, FieldAffordanceResponse,
};
use crate::infra::http::api::state::ApiState;

pub async fn list_blocks(State(state): State<ApiState>) -> impl IntoResponse {
    let groups: Vec<BlockCategoryResponse> = state
        .registry
        .list_by_category()
        .into_iter()
        .map(BlockCategoryResponse::from)
        .collect();
    Json(groups)
}

pub async fn get_block(
    State(state): State<ApiState>,
    Path(type_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let definition = state
        .registry
        .get(&type_id)
        .map_err(|_| ApiError::not_found("block type not found"))?;
    Ok(Json(BlockTypeResponse::from(definition)))
}

pub async fn preview_block(
    State(state): State<ApiState>,
    Json(payload): Json<BlockPreviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let preview = state
        .editor
        .preview(&payload.type_id, payload.data)
        .map_err(editor_to_api)?;

    Ok(Json(BlockPreviewResponse {
        valid: preview.is_valid(),
        html: preview.html,
        issues: preview.issues,
    }))
}

pub async fn field_affordance(
    State(state): State<ApiState>,
    Path((type_id, field)): Path<(String, String)>,
    Json(payload): Json<FieldAffordanceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let affordance = state
        .editor
        .affordance(&type_id, &field, payload.value.as_ref())
        .map_err(editor_to_api)?;
    Ok(Json(FieldAffordanceResponse::from(affordance)))
}
