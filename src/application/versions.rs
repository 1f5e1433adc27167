//! Version history: listing, manual snapshots and two-sided restores.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::{AuditService, ENTITY_PAGE};
use crate::application::error::ErrorKind;
use crate::application::metrics::{METRIC_VERSION_RESTORES, METRIC_VERSIONS_CREATED};
use crate::application::repos::{
    PagesRepo, RepoError, RestoreOutcome, RestoreVersionParams, SnapshotParams, VersionsRepo,
};
use crate::domain::entities::PageVersionRecord;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("page not found")]
    PageNotFound,
    #[error("version not found")]
    VersionNotFound,
    #[error("slug `{0}` is already in use by another page")]
    SlugConflict(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl VersionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VersionError::PageNotFound => ErrorKind::NotFound,
            // The caller's view of the page's history is stale.
            VersionError::VersionNotFound | VersionError::SlugConflict(_) => ErrorKind::Conflict,
            VersionError::Repo(err) => ErrorKind::of_repo(err),
        }
    }
}

#[derive(Clone)]
pub struct VersionService {
    pages: Arc<dyn PagesRepo>,
    versions: Arc<dyn VersionsRepo>,
    audit: AuditService,
}

impl VersionService {
    pub fn new(
        pages: Arc<dyn PagesRepo>,
        versions: Arc<dyn VersionsRepo>,
        audit: AuditService,
    ) -> Self {
        Self {
            pages,
            versions,
            audit,
        }
    }

    /// Versions of a page, newest first.
    pub async fn list_for(&self, page_id: Uuid) -> Result<Vec<PageVersionRecord>, VersionError> {
        self.ensure_page(page_id).await?;
        Ok(self.versions.list_versions(page_id).await?)
    }

    pub async fn find(&self, version_id: Uuid) -> Result<PageVersionRecord, VersionError> {
        self.versions
            .find_version(version_id)
            .await?
            .ok_or(VersionError::VersionNotFound)
    }

    /// Record the live state of a page as a new version without changing it.
    pub async fn snapshot(
        &self,
        actor: &str,
        page_id: Uuid,
    ) -> Result<PageVersionRecord, VersionError> {
        let params = SnapshotParams {
            created_by: actor.to_string(),
            restore_note: None,
        };
        let version = self
            .versions
            .append_version(page_id, params)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => VersionError::PageNotFound,
                other => VersionError::Repo(other),
            })?;

        counter!(METRIC_VERSIONS_CREATED).increment(1);
        Ok(version)
    }

    /// Roll a page back to `version_id`. The state being replaced and the
    /// restored state are both recorded, so the restore can itself be undone.
    pub async fn restore(
        &self,
        actor: &str,
        page_id: Uuid,
        version_id: Uuid,
    ) -> Result<RestoreOutcome, VersionError> {
        self.ensure_page(page_id).await?;
        let target = self.find(version_id).await?;
        if target.page_id != page_id {
            return Err(VersionError::VersionNotFound);
        }

        let params = RestoreVersionParams {
            page_id,
            version_id,
            created_by: actor.to_string(),
        };
        let outcome = self
            .versions
            .restore_version(params)
            .await
            .map_err(|err| {
                if err.is_slug_conflict() {
                    VersionError::SlugConflict(target.slug.clone())
                } else if matches!(err, RepoError::NotFound) {
                    VersionError::VersionNotFound
                } else {
                    VersionError::Repo(err)
                }
            })?;

        counter!(METRIC_VERSION_RESTORES).increment(1);
        counter!(METRIC_VERSIONS_CREATED).increment(2);
        info!(
            target = "tessera::versions",
            page_id = %page_id,
            restored_from = target.version_number,
            pre_restore = outcome.pre_restore.version_number,
            post_restore = outcome.post_restore.version_number,
            "page restored"
        );

        #[derive(Serialize)]
        struct RestoreAudit {
            restored_from: i32,
            pre_restore: i32,
            post_restore: i32,
        }
        self.audit
            .record_best_effort(
                actor,
                "page.restore",
                ENTITY_PAGE,
                Some(page_id),
                Some(&RestoreAudit {
                    restored_from: target.version_number,
                    pre_restore: outcome.pre_restore.version_number,
                    post_restore: outcome.post_restore.version_number,
                }),
            )
            .await;

        Ok(outcome)
    }

    async fn ensure_page(&self, page_id: Uuid) -> Result<(), VersionError> {
        match self.pages.find_by_id(page_id).await? {
            Some(_) => Ok(()),
            None => Err(VersionError::PageNotFound),
        }
    }
}
