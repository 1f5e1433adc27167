//! Version history handlers

use axum::Json;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tessera_api_types::PageVersionSummary;
use uuid::Uuid;

use super::{save_to_api, version_to_api};
use crate::application::versions::VersionError;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Actor;
use crate::infra::http::api::models::{restore_response, version_response, version_summary};
use crate::infra::http::api::state::ApiState;

pub async fn list_versions(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let versions = state.versions.list_for(id).await.map_err(version_to_api)?;
    let versions: Vec<PageVersionSummary> = versions.into_iter().map(version_summary).collect();
    Ok(Json(versions))
}

pub async fn get_version(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state.versions.find(id).await.map_err(|err| match err {
        VersionError::VersionNotFound => ApiError::not_found("version not found"),
        other => version_to_api(other),
    })?;
    Ok(Json(version_response(version)))
}

/// Record the live page as a new version without changing it.
pub async fn create_version(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let version = state
        .versions
        .snapshot(actor.as_str(), id)
        .await
        .map_err(version_to_api)?;
    Ok((StatusCode::CREATED, Json(version_response(version))))
}

pub async fn restore_version(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path((id, version_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .coordinator
        .restore(actor.as_str(), id, version_id)
        .await
        .map_err(save_to_api)?;
    Ok(Json(restore_response(outcome)))
}
