//! Audit handlers

use axum::Json;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use super::repo_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::AuditEntryResponse;
use crate::infra::http::api::state::ApiState;

#[derive(Debug, Deserialize)]
pub struct AuditListQuery {
    pub limit: Option<u32>,
}

pub async fn list_audit_logs(
    State(state): State<ApiState>,
    Query(query): Query<AuditListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state
        .audit
        .list_recent(query.limit.unwrap_or(50))
        .await
        .map_err(repo_to_api)?;
    let entries: Vec<AuditEntryResponse> =
        records.into_iter().map(AuditEntryResponse::from).collect();
    Ok(Json(entries))
}
