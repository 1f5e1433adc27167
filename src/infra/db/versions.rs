use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        RepoError, RestoreOutcome, RestoreVersionParams, SnapshotParams, VersionsRepo,
    },
    domain::entities::{PageRecord, PageVersionRecord},
    domain::types::ContentFormat,
    domain::versions::restore_note,
};

use super::{
    PostgresRepositories, map_sqlx_error,
    pages::{PAGE_COLUMNS, PageRow, lock_page},
};

const VERSION_COLUMNS: &str = "id, page_id, version_number, title, slug, content, \
    content_format, restore_note, created_by, created_at";

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: Uuid,
    page_id: Uuid,
    version_number: i32,
    title: String,
    slug: String,
    content: String,
    content_format: ContentFormat,
    restore_note: Option<String>,
    created_by: String,
    created_at: OffsetDateTime,
}

impl From<VersionRow> for PageVersionRecord {
    fn from(row: VersionRow) -> Self {
        Self {
            id: row.id,
            page_id: row.page_id,
            version_number: row.version_number,
            title: row.title,
            slug: row.slug,
            content: row.content,
            content_format: row.content_format,
            restore_note: row.restore_note,
            created_by: row.created_by,
            created_at: row.created_at,
        }
    }
}

/// Append a version holding `page`'s current content. The caller must hold
/// the page row lock so the number is allocated without gaps or duplicates.
pub(super) async fn insert_snapshot(
    tx: &mut Transaction<'_, Postgres>,
    page: &PageRecord,
    snapshot: SnapshotParams,
) -> Result<PageVersionRecord, RepoError> {
    let sql = format!(
        r#"
        INSERT INTO page_versions (
            id, page_id, version_number, title, slug, content,
            content_format, restore_note, created_by, created_at
        )
        SELECT $1, $2, COALESCE(MAX(version_number), 0) + 1, $3, $4, $5, $6, $7, $8, $9
        FROM page_versions
        WHERE page_id = $2
        RETURNING {VERSION_COLUMNS}
        "#
    );
    let row = sqlx::query_as::<_, VersionRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(page.id)
        .bind(&page.title)
        .bind(&page.slug)
        .bind(&page.content)
        .bind(page.content_format)
        .bind(snapshot.restore_note)
        .bind(snapshot.created_by)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

    Ok(PageVersionRecord::from(row))
}

#[async_trait]
impl VersionsRepo for PostgresRepositories {
    async fn list_versions(&self, page_id: Uuid) -> Result<Vec<PageVersionRecord>, RepoError> {
        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM page_versions WHERE page_id = $1 \
             ORDER BY version_number DESC"
        );
        let rows = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(page_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PageVersionRecord::from).collect())
    }

    async fn find_version(&self, id: Uuid) -> Result<Option<PageVersionRecord>, RepoError> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM page_versions WHERE id = $1");
        let row = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PageVersionRecord::from))
    }

    async fn append_version(
        &self,
        page_id: Uuid,
        snapshot: SnapshotParams,
    ) -> Result<PageVersionRecord, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        let page = lock_page(&mut tx, page_id)
            .await?
            .ok_or(RepoError::NotFound)?;
        let version = insert_snapshot(&mut tx, &page, snapshot).await?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(version)
    }

    async fn restore_version(
        &self,
        params: RestoreVersionParams,
    ) -> Result<RestoreOutcome, RepoError> {
        let RestoreVersionParams {
            page_id,
            version_id,
            created_by,
        } = params;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let page = lock_page(&mut tx, page_id)
            .await?
            .ok_or(RepoError::NotFound)?;

        let sql = format!(
            "SELECT {VERSION_COLUMNS} FROM page_versions WHERE id = $1 AND page_id = $2"
        );
        let target = sqlx::query_as::<_, VersionRow>(&sql)
            .bind(version_id)
            .bind(page_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .map(PageVersionRecord::from)
            .ok_or(RepoError::NotFound)?;

        let pre_restore = insert_snapshot(
            &mut tx,
            &page,
            SnapshotParams {
                created_by: created_by.clone(),
                restore_note: None,
            },
        )
        .await?;

        let sql = format!(
            r#"
            UPDATE pages
            SET title = $2, slug = $3, content = $4, content_format = $5, updated_at = $6
            WHERE id = $1
            RETURNING {PAGE_COLUMNS}
            "#
        );
        let restored = sqlx::query_as::<_, PageRow>(&sql)
            .bind(page_id)
            .bind(&target.title)
            .bind(&target.slug)
            .bind(&target.content)
            .bind(target.content_format)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let page = PageRecord::from(restored);

        let post_restore = insert_snapshot(
            &mut tx,
            &page,
            SnapshotParams {
                created_by,
                restore_note: Some(restore_note(target.version_number)),
            },
        )
        .await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(RestoreOutcome {
            page,
            pre_restore,
            post_restore,
        })
    }
}
