use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{AuditRepo, RepoError};
use crate::domain::entities::AuditLogRecord;

pub const ENTITY_PAGE: &str = "page";
pub const ENTITY_PAGE_ORDER: &str = "page_order";

/// Records who changed what. Each entry carries a JSON payload describing the change.
#[derive(Clone)]
pub struct AuditService {
    repo: Arc<dyn AuditRepo>,
}

impl AuditService {
    pub fn new(repo: Arc<dyn AuditRepo>) -> Self {
        Self { repo }
    }

    pub async fn record<S>(
        &self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        payload: Option<&S>,
    ) -> Result<(), RepoError>
    where
        S: Serialize,
    {
        let payload_text = payload
            .map(serde_json::to_string)
            .transpose()
            .map_err(RepoError::from_persistence)?;

        let record = AuditLogRecord {
            id: Uuid::new_v4(),
            actor: actor.to_string(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.map(|id| id.to_string()),
            payload_text,
            created_at: OffsetDateTime::now_utc(),
        };

        self.repo.append_log(record).await
    }

    /// Record after the write has committed. Failures are logged, not returned.
    pub async fn record_best_effort<S>(
        &self,
        actor: &str,
        action: &str,
        entity_type: &str,
        entity_id: Option<Uuid>,
        payload: Option<&S>,
    ) where
        S: Serialize,
    {
        if let Err(err) = self
            .record(actor, action, entity_type, entity_id, payload)
            .await
        {
            warn!(
                target = "tessera::audit",
                action,
                error = %err,
                "failed to append audit record"
            );
        }
    }

    pub async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError> {
        self.repo.list_recent(limit.clamp(1, 200)).await
    }
}
