//! Display order of pages.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::audit::{AuditService, ENTITY_PAGE_ORDER};
use crate::application::error::ErrorKind;
use crate::application::metrics::METRIC_PAGE_REORDERS;
use crate::application::repos::{OrderRepo, RepoError};
use crate::domain::ordering::OrderMismatch;
use crate::domain::types::PageOrderEntry;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Mismatch(OrderMismatch),
    #[error(transparent)]
    Repo(RepoError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::Mismatch(_) => ErrorKind::Conflict,
            OrderError::Repo(err) => ErrorKind::of_repo(err),
        }
    }
}

impl From<RepoError> for OrderError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::OrderMismatch(mismatch) => OrderError::Mismatch(mismatch),
            other => OrderError::Repo(other),
        }
    }
}

#[derive(Clone)]
pub struct OrderingService {
    repo: Arc<dyn OrderRepo>,
    audit: AuditService,
}

impl OrderingService {
    pub fn new(repo: Arc<dyn OrderRepo>, audit: AuditService) -> Self {
        Self { repo, audit }
    }

    pub async fn current(&self) -> Result<Vec<PageOrderEntry>, OrderError> {
        Ok(self.repo.list_order().await?)
    }

    /// Apply a complete ordering. `ids` must name every page exactly once;
    /// otherwise nothing changes.
    pub async fn reorder(
        &self,
        actor: &str,
        ids: &[Uuid],
    ) -> Result<Vec<PageOrderEntry>, OrderError> {
        let entries = self.repo.reorder_pages(ids).await?;

        counter!(METRIC_PAGE_REORDERS).increment(1);
        info!(target = "tessera::ordering", pages = entries.len(), "pages reordered");

        #[derive(Serialize)]
        struct ReorderAudit<'a> {
            ids: &'a [Uuid],
        }
        self.audit
            .record_best_effort(
                actor,
                "page.reorder",
                ENTITY_PAGE_ORDER,
                None,
                Some(&ReorderAudit { ids }),
            )
            .await;

        Ok(entries)
    }
}
