//! Page ordering handlers

use axum::Json;
use axum::extract::{Extension, State};
use axum::response::IntoResponse;
use tessera_api_types::ReorderRequest;

use super::order_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Actor;
use crate::infra::http::api::models::order_response;
use crate::infra::http::api::state::ApiState;

pub async fn get_order(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let entries = state.ordering.current().await.map_err(order_to_api)?;
    Ok(Json(order_response(entries)))
}

pub async fn reorder_pages(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<ReorderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .ordering
        .reorder(actor.as_str(), &payload.ids)
        .await
        .map_err(order_to_api)?;
    Ok(Json(order_response(entries)))
}
