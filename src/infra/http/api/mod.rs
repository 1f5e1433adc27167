pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch, post, put},
};

use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/v1/blocks", get(handlers::list_blocks))
        .route("/api/v1/blocks/preview", post(handlers::preview_block))
        .route("/api/v1/blocks/{type_id}", get(handlers::get_block))
        .route(
            "/api/v1/blocks/{type_id}/fields/{field}",
            post(handlers::field_affordance),
        )
        .route(
            "/api/v1/pages",
            get(handlers::list_pages).post(handlers::create_page),
        )
        .route(
            "/api/v1/pages/order",
            get(handlers::get_order).put(handlers::reorder_pages),
        )
        .route(
            "/api/v1/pages/{id}",
            get(handlers::get_page).delete(handlers::delete_page),
        )
        .route(
            "/api/v1/pages/{id}/settings",
            patch(handlers::update_page_settings),
        )
        .route("/api/v1/pages/{id}/draft", put(handlers::stage_draft))
        .route("/api/v1/pages/{id}/save", post(handlers::save_page))
        .route(
            "/api/v1/pages/{id}/session",
            get(handlers::get_session).delete(handlers::close_session),
        )
        .route("/api/v1/pages/{id}/blocks", put(handlers::save_blocks))
        .route("/api/v1/pages/{id}/blocks/ops", post(handlers::apply_block_ops))
        .route("/api/v1/pages/{id}/duplicate", post(handlers::duplicate_page))
        .route(
            "/api/v1/pages/{id}/versions",
            get(handlers::list_versions).post(handlers::create_version),
        )
        .route(
            "/api/v1/pages/{id}/versions/{version_id}/restore",
            post(handlers::restore_version),
        )
        .route("/api/v1/versions/{id}", get(handlers::get_version))
        .route("/api/v1/audit", get(handlers::list_audit_logs))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::resolve_actor))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
