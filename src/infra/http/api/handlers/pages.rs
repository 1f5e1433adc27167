//! Pages handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tessera_api_types::{
    BlockOpsRequest, PageCreateRequest, PageResponse, PageSaveRequest, PageSettingsRequest,
    SaveBlocksRequest,
};
use uuid::Uuid;

use super::{page_to_api, save_to_api};
use crate::application::autosave::SaveError;
use crate::application::pages::{CreatePageCommand, SavePageCommand, UpdateSettingsCommand};
use crate::domain::blocks::BlockDocument;
use crate::domain::types::ContentFormat;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::middleware::Actor;
use crate::infra::http::api::models::{
    block_instance, page_response, save_response, session_response, working_copy_response,
};
use crate::infra::http::api::state::ApiState;

pub(crate) fn save_command(payload: PageSaveRequest) -> SavePageCommand {
    SavePageCommand {
        title: payload.title,
        slug: payload.slug,
        content: payload.content,
        content_format: payload.content_format,
        is_published: payload.is_published,
        publish_at: payload.publish_at,
        meta_title: payload.meta_title,
        meta_description: payload.meta_description,
        noindex: payload.noindex,
        show_in_menu: payload.show_in_menu,
        menu_location: payload.menu_location,
    }
}

pub async fn list_pages(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let pages = state.pages.list().await.map_err(page_to_api)?;
    let pages: Vec<PageResponse> = pages.into_iter().map(page_response).collect();
    Ok(Json(pages))
}

pub async fn create_page(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<PageCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreatePageCommand {
        title: payload.title,
        slug: payload.slug,
        content_format: payload.content_format.unwrap_or_default(),
    };

    let page = state
        .pages
        .create(actor.as_str(), command)
        .await
        .map_err(page_to_api)?;

    Ok((StatusCode::CREATED, Json(page_response(page))))
}

pub async fn get_page(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.pages.find(id).await.map_err(page_to_api)?;
    Ok(Json(page_response(page)))
}

pub async fn delete_page(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .coordinator
        .delete(actor.as_str(), id)
        .await
        .map_err(save_to_api)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_page_settings(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateSettingsCommand {
        title: payload.title,
        slug: payload.slug,
        is_published: payload.is_published,
        publish_at: payload.publish_at,
        show_in_menu: payload.show_in_menu,
        menu_location: payload.menu_location,
    };

    let page = state
        .coordinator
        .update_settings(actor.as_str(), id, command)
        .await
        .map_err(save_to_api)?;

    Ok(Json(page_response(page)))
}

/// Stage a working copy. It is written by the next autosave or explicit save.
pub async fn stage_draft(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<PageSaveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .coordinator
        .edit(actor.as_str(), id, save_command(payload))
        .await
        .map_err(save_to_api)?;
    Ok((StatusCode::ACCEPTED, Json(session_response(session))))
}

/// Explicit save. An empty body saves whatever is staged.
pub async fn save_page(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let command = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let payload: PageSaveRequest = serde_json::from_slice(&body)
            .map_err(|err| ApiError::bad_request("invalid JSON body", Some(err.to_string())))?;
        Some(save_command(payload))
    };

    let outcome = state
        .coordinator
        .save(actor.as_str(), id, command)
        .await
        .map_err(save_to_api)?;

    Ok(Json(save_response(outcome)))
}

/// Replace the page body with a block list and save it explicitly.
pub async fn save_blocks(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SaveBlocksRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let base = match state.coordinator.draft(id).await {
        Some(draft) => draft,
        None => {
            let page = state.pages.find(id).await.map_err(page_to_api)?;
            SavePageCommand::from_record(&page)
        }
    };

    let document = BlockDocument {
        blocks: payload.blocks.into_iter().map(block_instance).collect(),
    };
    let content = document
        .to_content()
        .map_err(|err| save_to_api(SaveError::Blocks(err)))?;
    let command = SavePageCommand {
        content,
        content_format: Some(ContentFormat::Blocks),
        ..base
    };

    let outcome = state
        .coordinator
        .save(actor.as_str(), id, Some(command))
        .await
        .map_err(save_to_api)?;

    Ok(Json(save_response(outcome)))
}

pub async fn apply_block_ops(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BlockOpsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .coordinator
        .edit_blocks(actor.as_str(), id, payload.ops)
        .await
        .map_err(save_to_api)?;
    Ok(Json(working_copy_response(view)))
}

pub async fn duplicate_page(
    State(state): State<ApiState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state
        .pages
        .duplicate(actor.as_str(), id)
        .await
        .map_err(page_to_api)?;
    Ok((StatusCode::CREATED, Json(page_response(page))))
}
