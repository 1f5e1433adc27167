//! Process-local repositories used when no database is configured and in tests.
//!
//! All state sits behind one async mutex, so every operation is atomic with
//! respect to every other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::repos::{
    AuditRepo, CreatePageParams, OrderRepo, PagesRepo, PagesWriteRepo, RepoError,
    RestoreOutcome, RestoreVersionParams, SnapshotParams, UpdatePageParams, VersionsRepo,
};
use crate::domain::entities::{AuditLogRecord, PageRecord, PageVersionRecord};
use crate::domain::ordering::{ranks, validate_permutation};
use crate::domain::types::PageOrderEntry;
use crate::domain::versions::{next_version_number, restore_note};

const SLUG_CONSTRAINT: &str = "pages_slug_key";

#[derive(Default)]
struct MemoryState {
    pages: HashMap<Uuid, PageRecord>,
    versions: Vec<PageVersionRecord>,
    audit: Vec<AuditLogRecord>,
}

impl MemoryState {
    fn ordered_pages(&self) -> Vec<PageRecord> {
        let mut pages: Vec<PageRecord> = self.pages.values().cloned().collect();
        pages.sort_by_key(|page| (page.position, page.created_at, page.id));
        pages
    }

    fn ensure_slug_free(&self, slug: &str, except: Option<Uuid>) -> Result<(), RepoError> {
        let taken = self
            .pages
            .values()
            .any(|page| page.slug == slug && Some(page.id) != except);
        if taken {
            return Err(RepoError::Duplicate {
                constraint: SLUG_CONSTRAINT.to_string(),
            });
        }
        Ok(())
    }

    fn snapshot(
        &mut self,
        page_id: Uuid,
        params: SnapshotParams,
    ) -> Result<PageVersionRecord, RepoError> {
        let page = self.pages.get(&page_id).ok_or(RepoError::NotFound)?;
        let current_max = self
            .versions
            .iter()
            .filter(|version| version.page_id == page_id)
            .map(|version| version.version_number)
            .max();

        let version = PageVersionRecord {
            id: Uuid::new_v4(),
            page_id,
            version_number: next_version_number(current_max),
            title: page.title.clone(),
            slug: page.slug.clone(),
            content: page.content.clone(),
            content_format: page.content_format,
            restore_note: params.restore_note,
            created_by: params.created_by,
            created_at: OffsetDateTime::now_utc(),
        };
        self.versions.push(version.clone());
        Ok(version)
    }

    fn compact_positions(&mut self) {
        let ordered: Vec<Uuid> = self.ordered_pages().iter().map(|page| page.id).collect();
        for (id, position) in ranks(&ordered) {
            if let Some(page) = self.pages.get_mut(&id) {
                page.position = position;
            }
        }
    }

    fn order_entries(&self) -> Vec<PageOrderEntry> {
        self.ordered_pages()
            .into_iter()
            .map(|page| PageOrderEntry {
                page_id: page.id,
                position: page.position,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRepositories {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PagesRepo for InMemoryRepositories {
    async fn list_pages(&self) -> Result<Vec<PageRecord>, RepoError> {
        Ok(self.state.lock().await.ordered_pages())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<PageRecord>, RepoError> {
        Ok(self.state.lock().await.pages.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PageRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.pages.values().find(|page| page.slug == slug).cloned())
    }
}

#[async_trait]
impl PagesWriteRepo for InMemoryRepositories {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.ensure_slug_free(&params.slug, None)?;

        let position = state
            .pages
            .values()
            .map(|page| page.position + 1)
            .max()
            .unwrap_or(0);
        let now = OffsetDateTime::now_utc();
        let page = PageRecord {
            id: Uuid::new_v4(),
            title: params.title,
            slug: params.slug,
            content: params.content,
            content_format: params.content_format,
            is_published: params.is_published,
            publish_at: params.publish_at,
            show_in_menu: params.show_in_menu,
            menu_location: params.menu_location,
            seo: params.seo,
            position,
            created_at: now,
            updated_at: now,
        };
        state.pages.insert(page.id, page.clone());
        Ok(page)
    }

    async fn update_page(
        &self,
        params: UpdatePageParams,
        snapshot: Option<SnapshotParams>,
    ) -> Result<(PageRecord, Option<PageVersionRecord>), RepoError> {
        let mut state = self.state.lock().await;
        if !state.pages.contains_key(&params.id) {
            return Err(RepoError::NotFound);
        }
        state.ensure_slug_free(&params.slug, Some(params.id))?;

        let page = state.pages.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        page.title = params.title;
        page.slug = params.slug;
        page.content = params.content;
        page.content_format = params.content_format;
        page.is_published = params.is_published;
        page.publish_at = params.publish_at;
        page.show_in_menu = params.show_in_menu;
        page.menu_location = params.menu_location;
        page.seo = params.seo;
        page.updated_at = OffsetDateTime::now_utc();
        let page = page.clone();

        let version = snapshot
            .map(|snapshot| state.snapshot(page.id, snapshot))
            .transpose()?;
        Ok((page, version))
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if state.pages.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        state.versions.retain(|version| version.page_id != id);
        state.compact_positions();
        Ok(())
    }
}

#[async_trait]
impl VersionsRepo for InMemoryRepositories {
    async fn list_versions(&self, page_id: Uuid) -> Result<Vec<PageVersionRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut versions: Vec<PageVersionRecord> = state
            .versions
            .iter()
            .filter(|version| version.page_id == page_id)
            .cloned()
            .collect();
        versions.sort_by(|a, b| b.version_number.cmp(&a.version_number));
        Ok(versions)
    }

    async fn find_version(&self, id: Uuid) -> Result<Option<PageVersionRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state.versions.iter().find(|version| version.id == id).cloned())
    }

    async fn append_version(
        &self,
        page_id: Uuid,
        snapshot: SnapshotParams,
    ) -> Result<PageVersionRecord, RepoError> {
        self.state.lock().await.snapshot(page_id, snapshot)
    }

    async fn restore_version(
        &self,
        params: RestoreVersionParams,
    ) -> Result<RestoreOutcome, RepoError> {
        let mut state = self.state.lock().await;
        let target = state
            .versions
            .iter()
            .find(|version| version.id == params.version_id && version.page_id == params.page_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        if !state.pages.contains_key(&params.page_id) {
            return Err(RepoError::NotFound);
        }
        state.ensure_slug_free(&target.slug, Some(params.page_id))?;

        let pre_restore = state.snapshot(
            params.page_id,
            SnapshotParams {
                created_by: params.created_by.clone(),
                restore_note: None,
            },
        )?;

        let page = state
            .pages
            .get_mut(&params.page_id)
            .ok_or(RepoError::NotFound)?;
        page.title = target.title.clone();
        page.slug = target.slug.clone();
        page.content = target.content.clone();
        page.content_format = target.content_format;
        page.updated_at = OffsetDateTime::now_utc();
        let page = page.clone();

        let post_restore = state.snapshot(
            params.page_id,
            SnapshotParams {
                created_by: params.created_by,
                restore_note: Some(restore_note(target.version_number)),
            },
        )?;

        Ok(RestoreOutcome {
            page,
            pre_restore,
            post_restore,
        })
    }
}

#[async_trait]
impl OrderRepo for InMemoryRepositories {
    async fn list_order(&self) -> Result<Vec<PageOrderEntry>, RepoError> {
        Ok(self.state.lock().await.order_entries())
    }

    async fn reorder_pages(&self, ordered: &[Uuid]) -> Result<Vec<PageOrderEntry>, RepoError> {
        let mut state = self.state.lock().await;
        let existing: Vec<Uuid> = state.pages.keys().copied().collect();
        validate_permutation(&existing, ordered)?;

        for (id, position) in ranks(ordered) {
            if let Some(page) = state.pages.get_mut(&id) {
                page.position = position;
            }
        }
        Ok(state.order_entries())
    }
}

#[async_trait]
impl AuditRepo for InMemoryRepositories {
    async fn append_log(&self, record: AuditLogRecord) -> Result<(), RepoError> {
        self.state.lock().await.audit.push(record);
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<AuditLogRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .audit
            .iter()
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }
}
