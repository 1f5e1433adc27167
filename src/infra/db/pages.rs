use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::repos::{
        CreatePageParams, PagesRepo, PagesWriteRepo, RepoError, SnapshotParams, UpdatePageParams,
    },
    domain::entities::{PageRecord, PageSeo, PageVersionRecord},
    domain::types::{ContentFormat, MenuLocation},
};

use super::{PostgresRepositories, map_sqlx_error, versions::insert_snapshot};

pub(super) const PAGE_COLUMNS: &str = "id, title, slug, content, content_format, \
    is_published, publish_at, show_in_menu, menu_location, \
    meta_title, meta_description, noindex, position, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(super) struct PageRow {
    id: Uuid,
    title: String,
    slug: String,
    content: String,
    content_format: ContentFormat,
    is_published: bool,
    publish_at: Option<OffsetDateTime>,
    show_in_menu: bool,
    menu_location: Option<MenuLocation>,
    meta_title: Option<String>,
    meta_description: Option<String>,
    noindex: bool,
    position: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<PageRow> for PageRecord {
    fn from(row: PageRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            slug: row.slug,
            content: row.content,
            content_format: row.content_format,
            is_published: row.is_published,
            publish_at: row.publish_at,
            show_in_menu: row.show_in_menu,
            menu_location: row.menu_location,
            seo: PageSeo {
                meta_title: row.meta_title,
                meta_description: row.meta_description,
                noindex: row.noindex,
            },
            position: row.position,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Fetch a page and hold its row lock until the transaction ends.
pub(super) async fn lock_page(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<PageRecord>, RepoError> {
    let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1 FOR UPDATE");
    let row = sqlx::query_as::<_, PageRow>(&sql)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
    Ok(row.map(PageRecord::from))
}

#[async_trait]
impl PagesRepo for PostgresRepositories {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages ORDER BY position, created_at, id");
        let rows = sqlx::query_as::<_, PageRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(PageRecord::from).collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE id = $1");
        let row = sqlx::query_as::<_, PageRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PageRecord::from))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, RepoError> {
        let sql = format!("SELECT {PAGE_COLUMNS} FROM pages WHERE slug = $1");
        let row = sqlx::query_as::<_, PageRow>(&sql)
            .bind(slug)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.map(PageRecord::from))
    }
}

#[async_trait]
impl PagesWriteRepo for PostgresRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let CreatePageParams {
            title,
            slug,
            content,
            content_format,
            is_published,
            publish_at,
            show_in_menu,
            menu_location,
            seo,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::lock_order(&mut tx).await?;

        let sql = format!(
            r#"
            INSERT INTO pages (
                id, title, slug, content, content_format,
                is_published, publish_at, show_in_menu, menu_location,
                meta_title, meta_description, noindex,
                position, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5,
                $6, $7, $8, $9,
                $10, $11, $12,
                (SELECT COALESCE(MAX(position) + 1, 0) FROM pages), $13, $13
            )
            RETURNING {PAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PageRow>(&sql)
            .bind(id)
            .bind(title)
            .bind(slug)
            .bind(content)
            .bind(content_format)
            .bind(is_published)
            .bind(publish_at)
            .bind(show_in_menu)
            .bind(menu_location)
            .bind(seo.meta_title)
            .bind(seo.meta_description)
            .bind(seo.noindex)
            .bind(now)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(PageRecord::from(row))
    }

    async fn update_page(
        &self,
        params: UpdatePageParams,
        snapshot: Option<SnapshotParams>,
    ) -> Result<(PageRecord, Option<PageVersionRecord>), RepoError> {
        let UpdatePageParams {
            id,
            title,
            slug,
            content,
            content_format,
            is_published,
            publish_at,
            show_in_menu,
            menu_location,
            seo,
        } = params;

        let now = OffsetDateTime::now_utc();
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let sql = format!(
            r#"
            UPDATE pages
            SET title = $2,
                slug = $3,
                content = $4,
                content_format = $5,
                is_published = $6,
                publish_at = $7,
                show_in_menu = $8,
                menu_location = $9,
                meta_title = $10,
                meta_description = $11,
                noindex = $12,
                updated_at = $13
            WHERE id = $1
            RETURNING {PAGE_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PageRow>(&sql)
            .bind(id)
            .bind(title)
            .bind(slug)
            .bind(content)
            .bind(content_format)
            .bind(is_published)
            .bind(publish_at)
            .bind(show_in_menu)
            .bind(menu_location)
            .bind(seo.meta_title)
            .bind(seo.meta_description)
            .bind(seo.noindex)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(RepoError::NotFound)?;
        let page = PageRecord::from(row);

        // The UPDATE holds the page row lock, so version numbers cannot race.
        let version = match snapshot {
            Some(snapshot) => Some(insert_snapshot(&mut tx, &page, snapshot).await?),
            None => None,
        };

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok((page, version))
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        Self::lock_order(&mut tx).await?;

        let result = sqlx::query("DELETE FROM pages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        sqlx::query(
            r#"
            UPDATE pages
            SET position = ranked.rank
            FROM (
                SELECT id, (ROW_NUMBER() OVER (ORDER BY position, created_at, id) - 1)::int4 AS rank
                FROM pages
            ) AS ranked
            WHERE pages.id = ranked.id AND pages.position <> ranked.rank
            "#,
        )
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(())
    }
}
