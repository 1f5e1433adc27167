//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{AuditLogRecord, PageRecord, PageSeo, PageVersionRecord};
use crate::domain::ordering::OrderMismatch;
use crate::domain::types::{ContentFormat, MenuLocation, PageOrderEntry};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("concurrent write conflict: {message}")]
    Concurrency { message: String },
    #[error(transparent)]
    OrderMismatch(#[from] OrderMismatch),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn is_slug_conflict(&self) -> bool {
        matches!(self, RepoError::Duplicate { constraint } if constraint.contains("slug"))
    }
}

#[derive(Debug, Clone)]
pub struct CreatePageParams {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub is_published: bool,
    pub publish_at: Option<OffsetDateTime>,
    pub show_in_menu: bool,
    pub menu_location: Option<MenuLocation>,
    pub seo: PageSeo,
}

/// Full replacement of a page's mutable columns. Position is managed by the order repo.
#[derive(Debug, Clone)]
pub struct UpdatePageParams {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_format: ContentFormat,
    pub is_published: bool,
    pub publish_at: Option<OffsetDateTime>,
    pub show_in_menu: bool,
    pub menu_location: Option<MenuLocation>,
    pub seo: PageSeo,
}

impl UpdatePageParams {
    pub fn from_record(page: &PageRecord) -> Self {
        Self {
            id: page.id,
            title: page.title.clone(),
            slug: page.slug.clone(),
            content: page.content.clone(),
            content_format: page.content_format,
            is_published: page.is_published,
            publish_at: page.publish_at,
            show_in_menu: page.show_in_menu,
            menu_location: page.menu_location,
            seo: page.seo.clone(),
        }
    }
}

/// Request to snapshot the post-write state in the same transaction.
#[derive(Debug, Clone)]
pub struct SnapshotParams {
    pub created_by: String,
    pub restore_note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestoreVersionParams {
    pub page_id: Uuid,
    pub version_id: Uuid,
    pub created_by: String,
}

#[derive(Debug, Clone)]
pub struct RestoreOutcome {
    pub page: PageRecord,
    pub pre_restore: PageVersionRecord,
    pub post_restore: PageVersionRecord,
}

#[async_trait]
pub trait PagesRepo: Send + Sync {
    /// All pages in rank order.
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, RepoError>;
}

#[async_trait]
pub trait PagesWriteRepo: Send + Sync {
    /// Insert a page at the end of the order.
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError>;

    /// Overwrite a page and, when `snapshot` is set, append a version of the
    /// result. Both happen atomically.
    async fn update_page(
        &self,
        params: UpdatePageParams,
        snapshot: Option<SnapshotParams>,
    ) -> Result<(PageRecord, Option<PageVersionRecord>), RepoError>;

    /// Remove a page with its versions and close the gap in the order.
    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait VersionsRepo: Send + Sync {
    /// Versions of a page, newest first.
    async fn list_versions(&self, page_id: Uuid) -> Result<Vec<PageVersionRecord>, RepoError>;

    async fn find_version(&self, id: Uuid) -> Result<Option<PageVersionRecord>, RepoError>;

    /// Snapshot the live state of a page as its next version.
    async fn append_version(
        &self,
        page_id: Uuid,
        snapshot: SnapshotParams,
    ) -> Result<PageVersionRecord, RepoError>;

    /// Snapshot, copy the version's content onto the page, snapshot again.
    /// Fails with `NotFound` when the version does not belong to the page.
    async fn restore_version(
        &self,
        params: RestoreVersionParams,
    ) -> Result<RestoreOutcome, RepoError>;
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn list_order(&self) -> Result<Vec<PageOrderEntry>, RepoError>;

    /// Rewrite every rank to match `ordered`, or nothing when it is not a
    /// permutation of the stored pages.
    async fn reorder_pages(&self, ordered: &[Uuid]) -> Result<Vec<PageOrderEntry>, RepoError>;
}

#[async_trait]
pub trait AuditRepo: Send + Sync {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError>;
}
