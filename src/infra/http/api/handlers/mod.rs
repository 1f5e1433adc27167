//! API handlers organized by resource type.
//!
//! Error conversion helpers shared by the resource modules live here.

mod audit;
mod blocks;
mod ordering;
mod pages;
mod sessions;
mod versions;

pub use audit::*;
pub use blocks::*;
pub use ordering::*;
pub use pages::*;
pub use sessions::*;
pub use versions::*;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::autosave::SaveError;
use crate::application::editor::EditorError;
use crate::application::error::ErrorKind;
use crate::application::ordering::OrderError;
use crate::application::pages::PageError;
use crate::application::repos::RepoError;
use crate::application::versions::VersionError;

use super::error::{ApiError, codes};
use super::state::ApiState;

pub async fn health(State(state): State<ApiState>) -> Response {
    match state.db.as_ref() {
        Some(db) => super::super::db_health_response(db.health_check().await),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Concurrency { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::CONCURRENT_WRITE,
            "Concurrent write, retry",
            Some(message),
        ),
        RepoError::OrderMismatch(mismatch) => ApiError::new(
            StatusCode::CONFLICT,
            codes::ORDER_MISMATCH,
            "Submitted order does not match the stored pages",
            Some(mismatch.to_string()),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

pub(crate) fn page_to_api(err: PageError) -> ApiError {
    let kind = err.kind();
    match err {
        PageError::NotFound => ApiError::not_found("page not found"),
        PageError::SlugConflict(slug) => ApiError::new(
            StatusCode::CONFLICT,
            codes::SLUG_CONFLICT,
            "Slug is already in use",
            Some(slug),
        ),
        PageError::Repo(repo) => repo_to_api(repo),
        other => ApiError::classified(
            kind,
            if kind == ErrorKind::Conflict {
                codes::SLUG_CONFLICT
            } else {
                codes::VALIDATION
            },
            "Invalid page",
            Some(other.to_string()),
        ),
    }
}

pub(crate) fn version_to_api(err: VersionError) -> ApiError {
    match err {
        VersionError::PageNotFound => ApiError::not_found("page not found"),
        VersionError::VersionNotFound => ApiError::new(
            StatusCode::CONFLICT,
            codes::VERSION_NOT_FOUND,
            "Version does not exist for this page",
            None,
        ),
        VersionError::SlugConflict(slug) => ApiError::new(
            StatusCode::CONFLICT,
            codes::SLUG_CONFLICT,
            "Restored slug is already in use",
            Some(slug),
        ),
        VersionError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn order_to_api(err: OrderError) -> ApiError {
    match err {
        OrderError::Mismatch(mismatch) => ApiError::new(
            StatusCode::CONFLICT,
            codes::ORDER_MISMATCH,
            "Submitted order does not match the stored pages",
            Some(mismatch.to_string()),
        ),
        OrderError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn save_to_api(err: SaveError) -> ApiError {
    match err {
        SaveError::Page(inner) => page_to_api(inner),
        SaveError::Version(inner) => version_to_api(inner),
        SaveError::Blocks(inner) => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Block edit rejected",
            Some(inner.to_string()),
        ),
        SaveError::NotBlocks => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::VALIDATION,
            "Page content is not block-based",
            None,
        ),
        SaveError::UnsavedChanges => ApiError::new(
            StatusCode::CONFLICT,
            codes::UNSAVED_CHANGES,
            "Save or discard the pending draft first",
            None,
        ),
    }
}

pub(crate) fn editor_to_api(err: EditorError) -> ApiError {
    let kind = err.kind();
    match err {
        EditorError::UnknownBlockType(_) | EditorError::UnknownField { .. } => {
            ApiError::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Unknown block type or field",
                Some(err.to_string()),
            )
        }
        EditorError::Field { .. } => ApiError::classified(
            kind,
            codes::VALIDATION,
            "Invalid field value",
            Some(err.to_string()),
        ),
        EditorError::Render { .. } => ApiError::classified(
            kind,
            codes::RENDER,
            "Rendering failed",
            Some(err.to_string()),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ordering::OrderMismatch;

    #[test]
    fn order_mismatch_is_conflict() {
        let err = order_to_api(OrderError::Mismatch(OrderMismatch {
            missing: 1,
            unknown: 0,
            duplicated: 0,
        }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::ORDER_MISMATCH);
    }

    #[test]
    fn stale_version_is_conflict_not_missing() {
        let err = version_to_api(VersionError::VersionNotFound);
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::VERSION_NOT_FOUND);
    }

    #[test]
    fn concurrency_is_retryable_conflict() {
        let err = repo_to_api(RepoError::Concurrency {
            message: "40001".into(),
        });
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::CONCURRENT_WRITE);
    }

    #[test]
    fn slug_exhaustion_is_conflict() {
        let err = page_to_api(PageError::SlugConflict("about".into()));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::SLUG_CONFLICT);
    }
}
