//! Page records: creation, settings, saves, duplication and deletion.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::audit::{AuditService, ENTITY_PAGE};
use crate::application::error::ErrorKind;
use crate::application::metrics::{METRIC_PAGE_SAVES, METRIC_SAVE_MS, METRIC_VERSIONS_CREATED};
use crate::application::repos::{
    CreatePageParams, PagesRepo, PagesWriteRepo, RepoError, SnapshotParams, UpdatePageParams,
};
use crate::domain::blocks::{BlockDocument, BlockEditError, BlockRegistry};
use crate::domain::entities::{PageRecord, PageSeo, PageVersionRecord};
use crate::domain::error::DomainError;
use crate::domain::pages::{
    MAX_META_DESCRIPTION_LEN, MAX_META_TITLE_LEN, require_title, resolve_menu_location,
    sanitize_html, save_title, seo_text,
};
use crate::domain::slug::{
    SlugAsyncError, SlugError, derive_slug, generate_unique_slug_async, sanitize_slug,
};
use crate::domain::types::{ContentFormat, MenuLocation, SaveMode};

#[derive(Debug, Error)]
pub enum PageError {
    #[error("page not found")]
    NotFound,
    #[error("slug `{0}` is already in use")]
    SlugConflict(String),
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("invalid slug: {0}")]
    Slug(#[from] SlugError),
    #[error(transparent)]
    Blocks(#[from] BlockEditError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::NotFound => ErrorKind::NotFound,
            PageError::SlugConflict(_) | PageError::Slug(SlugError::Exhausted { .. }) => {
                ErrorKind::Conflict
            }
            PageError::Validation(_) | PageError::Slug(_) | PageError::Blocks(_) => {
                ErrorKind::Validation
            }
            PageError::Repo(err) => ErrorKind::of_repo(err),
        }
    }

    fn from_write(err: RepoError, slug: &str) -> Self {
        if err.is_slug_conflict() {
            PageError::SlugConflict(slug.to_string())
        } else if matches!(err, RepoError::NotFound) {
            PageError::NotFound
        } else {
            PageError::Repo(err)
        }
    }
}

#[derive(Debug, Clone)]
pub struct CreatePageCommand {
    pub title: String,
    pub slug: Option<String>,
    pub content_format: ContentFormat,
}

/// Partial settings update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateSettingsCommand {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub is_published: Option<bool>,
    /// `Some(None)` clears the schedule.
    pub publish_at: Option<Option<OffsetDateTime>>,
    pub show_in_menu: Option<bool>,
    pub menu_location: Option<MenuLocation>,
}

/// A full working copy of a page as submitted by the editor.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePageCommand {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub content_format: Option<ContentFormat>,
    pub is_published: Option<bool>,
    pub publish_at: Option<Option<OffsetDateTime>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub noindex: Option<bool>,
    pub show_in_menu: Option<bool>,
    pub menu_location: Option<MenuLocation>,
}

impl SavePageCommand {
    /// A command that rewrites the page's current content unchanged.
    pub fn from_record(page: &PageRecord) -> Self {
        Self {
            title: page.title.clone(),
            slug: page.slug.clone(),
            content: page.content.clone(),
            content_format: Some(page.content_format),
            is_published: None,
            publish_at: None,
            meta_title: None,
            meta_description: None,
            noindex: None,
            show_in_menu: None,
            menu_location: None,
        }
    }

    /// Take over the committed value of every field `settings` changed.
    /// Optional fields fall back to the live page on the next save.
    pub fn rebase_settings(&mut self, settings: &UpdateSettingsCommand, page: &PageRecord) {
        if settings.title.is_some() {
            self.title = page.title.clone();
        }
        if settings.slug.is_some() {
            self.slug = page.slug.clone();
        }
        if settings.is_published.is_some() {
            self.is_published = None;
        }
        if settings.publish_at.is_some() {
            self.publish_at = None;
        }
        if settings.show_in_menu.is_some() || settings.menu_location.is_some() {
            self.show_in_menu = None;
            self.menu_location = None;
        }
    }
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub page: PageRecord,
    pub version: Option<PageVersionRecord>,
}

#[derive(Serialize)]
struct PageAuditSnapshot<'a> {
    slug: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_number: Option<i32>,
}

impl<'a> PageAuditSnapshot<'a> {
    fn of(page: &'a PageRecord) -> Self {
        Self {
            slug: &page.slug,
            title: &page.title,
            version_number: None,
        }
    }
}

#[derive(Clone)]
pub struct PageService {
    reader: Arc<dyn PagesRepo>,
    writer: Arc<dyn PagesWriteRepo>,
    registry: Arc<BlockRegistry>,
    audit: AuditService,
}

impl PageService {
    pub fn new(
        reader: Arc<dyn PagesRepo>,
        writer: Arc<dyn PagesWriteRepo>,
        registry: Arc<BlockRegistry>,
        audit: AuditService,
    ) -> Self {
        Self {
            reader,
            writer,
            registry,
            audit,
        }
    }

    pub fn registry(&self) -> &Arc<BlockRegistry> {
        &self.registry
    }

    pub async fn list(&self) -> Result<Vec<PageRecord>, PageError> {
        Ok(self.reader.list_pages().await?)
    }

    pub async fn find(&self, id: Uuid) -> Result<PageRecord, PageError> {
        self.reader.find_by_id(id).await?.ok_or(PageError::NotFound)
    }

    pub async fn create(
        &self,
        actor: &str,
        command: CreatePageCommand,
    ) -> Result<PageRecord, PageError> {
        let title = require_title(&command.title)?;

        let slug = match command.slug.as_deref().map(str::trim) {
            Some(requested) if !requested.is_empty() => {
                let slug = sanitize_slug(requested)?;
                self.ensure_slug_available(&slug, None).await?;
                slug
            }
            _ => self.unique_slug(&derive_slug(&title)?).await?,
        };

        let params = CreatePageParams {
            title,
            slug: slug.clone(),
            content: String::new(),
            content_format: command.content_format,
            is_published: false,
            publish_at: None,
            show_in_menu: false,
            menu_location: None,
            seo: PageSeo::default(),
        };

        let page = self
            .writer
            .create_page(params)
            .await
            .map_err(|err| PageError::from_write(err, &slug))?;

        info!(target = "tessera::pages", page_id = %page.id, slug = %page.slug, "page created");
        self.audit
            .record_best_effort(
                actor,
                "page.create",
                ENTITY_PAGE,
                Some(page.id),
                Some(&PageAuditSnapshot::of(&page)),
            )
            .await;

        Ok(page)
    }

    pub async fn update_settings(
        &self,
        actor: &str,
        id: Uuid,
        command: UpdateSettingsCommand,
    ) -> Result<PageRecord, PageError> {
        let page = self.find(id).await?;
        let mut params = UpdatePageParams::from_record(&page);

        if let Some(title) = command.title.as_deref() {
            params.title = require_title(title)?;
        }
        if let Some(slug) = command.slug.as_deref() {
            params.slug = sanitize_slug(slug)?;
            if params.slug != page.slug {
                self.ensure_slug_available(&params.slug, Some(id)).await?;
            }
        }
        if let Some(is_published) = command.is_published {
            params.is_published = is_published;
        }
        if let Some(publish_at) = command.publish_at {
            params.publish_at = publish_at;
        }
        if let Some(show_in_menu) = command.show_in_menu {
            params.show_in_menu = show_in_menu;
        }
        params.menu_location = resolve_menu_location(
            params.show_in_menu,
            command.menu_location,
            page.menu_location,
        );

        let slug = params.slug.clone();
        let (page, _) = self
            .writer
            .update_page(params, None)
            .await
            .map_err(|err| PageError::from_write(err, &slug))?;

        self.audit
            .record_best_effort(
                actor,
                "page.settings",
                ENTITY_PAGE,
                Some(page.id),
                Some(&PageAuditSnapshot::of(&page)),
            )
            .await;

        Ok(page)
    }

    /// Persist a working copy. Explicit saves also append a version of the
    /// saved state in the same write; autosaves never do.
    pub async fn save(
        &self,
        actor: &str,
        id: Uuid,
        command: SavePageCommand,
        mode: SaveMode,
    ) -> Result<SaveOutcome, PageError> {
        let started = Instant::now();
        let page = self.find(id).await?;
        let params = self.prepare_save(&page, command, mode)?;

        if params.slug != page.slug {
            self.ensure_slug_available(&params.slug, Some(id)).await?;
        }

        let snapshot = mode.creates_version().then(|| SnapshotParams {
            created_by: actor.to_string(),
            restore_note: None,
        });

        let slug = params.slug.clone();
        let (page, version) = self
            .writer
            .update_page(params, snapshot)
            .await
            .map_err(|err| PageError::from_write(err, &slug))?;

        counter!(METRIC_PAGE_SAVES, "mode" => mode.as_str()).increment(1);
        histogram!(METRIC_SAVE_MS, "mode" => mode.as_str())
            .record(started.elapsed().as_secs_f64() * 1000.0);
        if version.is_some() {
            counter!(METRIC_VERSIONS_CREATED).increment(1);
        }

        debug!(
            target = "tessera::pages",
            page_id = %page.id,
            mode = mode.as_str(),
            version = version.as_ref().map(|v| v.version_number),
            "page saved"
        );

        let action = match mode {
            SaveMode::Explicit => "page.save",
            SaveMode::Autosave => "page.autosave",
        };
        let snapshot = PageAuditSnapshot {
            version_number: version.as_ref().map(|v| v.version_number),
            ..PageAuditSnapshot::of(&page)
        };
        self.audit
            .record_best_effort(actor, action, ENTITY_PAGE, Some(page.id), Some(&snapshot))
            .await;

        Ok(SaveOutcome { page, version })
    }

    pub async fn delete(&self, actor: &str, id: Uuid) -> Result<(), PageError> {
        let page = self.find(id).await?;
        self.writer.delete_page(id).await.map_err(|err| match err {
            RepoError::NotFound => PageError::NotFound,
            other => PageError::Repo(other),
        })?;

        info!(target = "tessera::pages", page_id = %id, "page deleted");
        self.audit
            .record_best_effort(
                actor,
                "page.delete",
                ENTITY_PAGE,
                Some(id),
                Some(&PageAuditSnapshot::of(&page)),
            )
            .await;
        Ok(())
    }

    /// Copy a page under a fresh slug. The copy is unpublished, hidden from
    /// menus and placed last.
    pub async fn duplicate(&self, actor: &str, id: Uuid) -> Result<PageRecord, PageError> {
        let source = self.find(id).await?;
        let title = require_title(&format!("{} (Copy)", source.title))?;
        let base = sanitize_slug(&format!("{}-copy", source.slug))?;
        let slug = self.unique_slug(&base).await?;

        let params = CreatePageParams {
            title,
            slug: slug.clone(),
            content: source.content.clone(),
            content_format: source.content_format,
            is_published: false,
            publish_at: None,
            show_in_menu: false,
            menu_location: source.menu_location,
            seo: source.seo.clone(),
        };

        let page = self
            .writer
            .create_page(params)
            .await
            .map_err(|err| PageError::from_write(err, &slug))?;

        #[derive(Serialize)]
        struct DuplicateAudit<'a> {
            source_id: Uuid,
            slug: &'a str,
        }
        self.audit
            .record_best_effort(
                actor,
                "page.duplicate",
                ENTITY_PAGE,
                Some(page.id),
                Some(&DuplicateAudit {
                    source_id: source.id,
                    slug: &page.slug,
                }),
            )
            .await;

        Ok(page)
    }

    /// Normalise stored content according to its format.
    pub fn normalise_content(
        &self,
        content: &str,
        format: ContentFormat,
    ) -> Result<String, PageError> {
        match format {
            ContentFormat::Html => Ok(sanitize_html(content)),
            ContentFormat::Blocks => {
                let parsed = BlockDocument::parse(content)?;
                let document = BlockDocument::ingest(&self.registry, parsed.blocks)?;
                Ok(document.to_content()?)
            }
        }
    }

    fn prepare_save(
        &self,
        page: &PageRecord,
        command: SavePageCommand,
        mode: SaveMode,
    ) -> Result<UpdatePageParams, PageError> {
        let mut params = UpdatePageParams::from_record(page);

        params.title = save_title(&command.title);
        if !command.slug.trim().is_empty() {
            params.slug = sanitize_slug(&command.slug)?;
        }
        params.content_format = command.content_format.unwrap_or(page.content_format);
        params.content = self.normalise_content(&command.content, params.content_format)?;

        if let Some(is_published) = command.is_published {
            params.is_published = is_published;
        }
        if let Some(publish_at) = command.publish_at {
            params.publish_at = publish_at;
        }
        if let Some(show_in_menu) = command.show_in_menu {
            params.show_in_menu = show_in_menu;
        }
        params.menu_location = resolve_menu_location(
            params.show_in_menu,
            command.menu_location,
            page.menu_location,
        );

        if mode == SaveMode::Explicit {
            if let Some(meta_title) = command.meta_title.as_deref() {
                params.seo.meta_title = seo_text(Some(meta_title), MAX_META_TITLE_LEN);
            }
            if let Some(description) = command.meta_description.as_deref() {
                params.seo.meta_description =
                    seo_text(Some(description), MAX_META_DESCRIPTION_LEN);
            }
            if let Some(noindex) = command.noindex {
                params.seo.noindex = noindex;
            }
        }

        Ok(params)
    }

    async fn ensure_slug_available(
        &self,
        slug: &str,
        except: Option<Uuid>,
    ) -> Result<(), PageError> {
        match self.reader.find_by_slug(slug).await? {
            Some(existing) if Some(existing.id) != except => {
                Err(PageError::SlugConflict(slug.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn unique_slug(&self, base: &str) -> Result<String, PageError> {
        let reader = self.reader.clone();
        generate_unique_slug_async(base, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .find_by_slug(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        .map_err(|err| match err {
            SlugAsyncError::Slug(err) => PageError::Slug(err),
            SlugAsyncError::Predicate(err) => PageError::Repo(err),
        })
    }
}
