use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{OrderRepo, RepoError},
    domain::ordering::{ranks, validate_permutation},
    domain::types::PageOrderEntry,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    position: i32,
}

impl From<OrderRow> for PageOrderEntry {
    fn from(row: OrderRow) -> Self {
        Self {
            page_id: row.id,
            position: row.position,
        }
    }
}

#[async_trait]
impl OrderRepo for PostgresRepositories {
    async fn list_order(&self) -> Result<Vec<PageOrderEntry>, RepoError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, position FROM pages ORDER BY position, created_at, id",
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PageOrderEntry::from).collect())
    }

    async fn reorder_pages(&self, ordered: &[Uuid]) -> Result<Vec<PageOrderEntry>, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::lock_order(&mut tx).await?;

        let existing: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM pages FOR UPDATE")
            .fetch_all(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        // Dropping the transaction rolls back; nothing has been written yet.
        validate_permutation(&existing, ordered)?;

        let (ids, positions): (Vec<Uuid>, Vec<i32>) = ranks(ordered).unzip();
        sqlx::query(
            r#"
            UPDATE pages
            SET position = o.rank
            FROM UNNEST($1::uuid[], $2::int4[]) AS o(id, rank)
            WHERE pages.id = o.id
            "#,
        )
        .bind(&ids)
        .bind(&positions)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, position FROM pages ORDER BY position, created_at, id",
        )
        .fetch_all(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PageOrderEntry::from).collect())
    }
}
