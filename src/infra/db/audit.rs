use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{AuditRepo, RepoError},
    domain::entities::AuditLogRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: Uuid,
    actor: String,
    action: String,
    entity_type: String,
    entity_id: Option<String>,
    payload_text: Option<String>,
    created_at: OffsetDateTime,
}

impl From<AuditRow> for AuditLogRecord {
    fn from(row: AuditRow) -> Self {
        Self {
            id: row.id,
            actor: row.actor,
            action: row.action,
            entity_type: row.entity_type,
            entity_id: row.entity_id,
            payload_text: row.payload_text,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl AuditRepo for PostgresRepositories {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (id, actor, action, entity_type, entity_id, payload_text, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.actor)
        .bind(record.action)
        .bind(record.entity_type)
        .bind(record.entity_id)
        .bind(record.payload_text)
        .bind(record.created_at)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError> {
        let rows = sqlx::query_as::<_, AuditRow>(
            r#"
            SELECT id, actor, action, entity_type, entity_id, payload_text, created_at
            FROM audit_logs
            ORDER BY created_at DESC, id DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit.clamp(1, 200)))
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(AuditLogRecord::from).collect())
    }
}
