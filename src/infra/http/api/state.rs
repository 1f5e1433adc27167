use std::sync::Arc;
use std::time::Duration;

use crate::application::audit::AuditService;
use crate::application::autosave::SaveCoordinator;
use crate::application::editor::EditorService;
use crate::application::ordering::OrderingService;
use crate::application::pages::PageService;
use crate::application::repos::{AuditRepo, OrderRepo, PagesRepo, PagesWriteRepo, VersionsRepo};
use crate::application::versions::VersionService;
use crate::domain::blocks::BlockRegistry;
use crate::infra::db::PostgresRepositories;

#[derive(Clone)]
pub struct ApiState {
    pub pages: PageService,
    pub versions: VersionService,
    pub ordering: OrderingService,
    pub coordinator: SaveCoordinator,
    pub editor: EditorService,
    pub audit: AuditService,
    pub registry: Arc<BlockRegistry>,
    /// Present when backed by Postgres; used by the health probe.
    pub db: Option<Arc<PostgresRepositories>>,
}

impl ApiState {
    /// Wire every service onto one repository implementation.
    pub fn from_repositories<R>(
        repositories: Arc<R>,
        registry: Arc<BlockRegistry>,
        debounce: Duration,
        db: Option<Arc<PostgresRepositories>>,
    ) -> Self
    where
        R: PagesRepo + PagesWriteRepo + VersionsRepo + OrderRepo + AuditRepo + 'static,
    {
        let audit = AuditService::new(repositories.clone() as Arc<dyn AuditRepo>);
        let pages = PageService::new(
            repositories.clone() as Arc<dyn PagesRepo>,
            repositories.clone() as Arc<dyn PagesWriteRepo>,
            registry.clone(),
            audit.clone(),
        );
        let versions = VersionService::new(
            repositories.clone() as Arc<dyn PagesRepo>,
            repositories.clone() as Arc<dyn VersionsRepo>,
            audit.clone(),
        );
        let ordering = OrderingService::new(repositories as Arc<dyn OrderRepo>, audit.clone());
        let coordinator = SaveCoordinator::new(pages.clone(), versions.clone(), debounce);
        let editor = EditorService::new(registry.clone());

        Self {
            pages,
            versions,
            ordering,
            coordinator,
            editor,
            audit,
            registry,
            db,
        }
    }
}
