use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::json;
use tessera::application::audit::AuditService;
use tessera::application::autosave::{SaveCoordinator, SaveError};
use tessera::application::pages::{
    CreatePageCommand, PageService, SavePageCommand, UpdateSettingsCommand,
};
use tessera::application::repos::{
    CreatePageParams, PagesWriteRepo, RepoError, SnapshotParams, UpdatePageParams,
};
use tessera::application::versions::{VersionError, VersionService};
use tessera::domain::blocks::{BlockDocument, BlockRegistry};
use tessera::domain::entities::{PageRecord, PageVersionRecord};
use tessera::domain::types::{ContentFormat, SessionPhase};
use tessera::infra::http::ApiState;
use tessera::infra::memory::InMemoryRepositories;
use tessera_api_types::BlockOp;
use tokio::sync::Notify;
use uuid::Uuid;

const DEBOUNCE: Duration = Duration::from_secs(60);
const ACTOR: &str = "editor@example.com";

fn registry() -> Arc<BlockRegistry> {
    Arc::new(BlockRegistry::builtin().expect("builtin catalog"))
}

fn state() -> ApiState {
    ApiState::from_repositories(
        Arc::new(InMemoryRepositories::new()),
        registry(),
        DEBOUNCE,
        None,
    )
}

async fn create_page(state: &ApiState, title: &str, format: ContentFormat) -> PageRecord {
    state
        .pages
        .create(
            ACTOR,
            CreatePageCommand {
                title: title.to_string(),
                slug: None,
                content_format: format,
            },
        )
        .await
        .expect("create page")
}

fn draft(page: &PageRecord, title: &str, content: &str) -> SavePageCommand {
    SavePageCommand {
        title: title.to_string(),
        content: content.to_string(),
        ..SavePageCommand::from_record(page)
    }
}

/// Let the autosave timer fire and its save run to completion.
async fn past_debounce() {
    tokio::time::sleep(DEBOUNCE + Duration::from_secs(1)).await;
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn edits_within_window_coalesce_into_one_autosave() {
    let state = state();
    let page = create_page(&state, "About", ContentFormat::Html).await;

    for n in 1..=3 {
        let session = state
            .coordinator
            .edit(ACTOR, page.id, draft(&page, "About", &format!("<p>edit {n}</p>")))
            .await
            .expect("stage edit");
        assert_eq!(session.phase, SessionPhase::Dirty);
        assert_eq!(session.revision, n);
        tokio::time::sleep(Duration::from_secs(10)).await;
    }

    let stored = state.pages.find(page.id).await.expect("page");
    assert_eq!(stored.content, "", "nothing written before the window closes");

    past_debounce().await;

    let stored = state.pages.find(page.id).await.expect("page");
    assert_eq!(stored.content, "<p>edit 3</p>");
    assert_eq!(
        state.coordinator.status(page.id).await.phase,
        SessionPhase::Idle
    );
    assert!(state.coordinator.draft(page.id).await.is_none());
    assert_eq!(state.coordinator.open_sessions(), 0, "settled sessions are released");

    let versions = state.versions.list_for(page.id).await.expect("versions");
    assert!(versions.is_empty(), "autosave must not create versions");
}

#[tokio::test(start_paused = true)]
async fn explicit_save_creates_exactly_one_version() {
    let state = state();
    let page = create_page(&state, "Team", ContentFormat::Html).await;

    state
        .coordinator
        .edit(ACTOR, page.id, draft(&page, "Team", "<p>draft</p>"))
        .await
        .expect("stage edit");
    let outcome = state
        .coordinator
        .save(ACTOR, page.id, None)
        .await
        .expect("explicit save");

    let version = outcome.version.expect("explicit save records a version");
    assert_eq!(version.version_number, 1);
    assert_eq!(version.content, "<p>draft</p>");
    assert_eq!(version.created_by, ACTOR);
    assert_eq!(outcome.page.content, "<p>draft</p>");

    // The pending timer was cancelled by the save; nothing else is written.
    past_debounce().await;
    let versions = state.versions.list_for(page.id).await.expect("versions");
    assert_eq!(versions.len(), 1);
    assert_eq!(
        state.coordinator.status(page.id).await.phase,
        SessionPhase::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_explicit_saves_number_versions_without_gaps() {
    let state = state();
    let page = create_page(&state, "Contact", ContentFormat::Html).await;

    let page_id = page.id;
    let saves = (0..8).map(|n| {
        let coordinator = state.coordinator.clone();
        let command = draft(&page, "Contact", &format!("<p>save {n}</p>"));
        async move { coordinator.save(ACTOR, page_id, Some(command)).await }
    });
    let results = join_all(saves).await;
    assert!(results.iter().all(Result::is_ok));

    let mut numbers: Vec<i32> = state
        .versions
        .list_for(page.id)
        .await
        .expect("versions")
        .iter()
        .map(|version| version.version_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
}

async fn save_content(state: &ApiState, page: &PageRecord, content: &str) -> PageVersionRecord {
    state
        .coordinator
        .save(ACTOR, page.id, Some(draft(page, &page.title, content)))
        .await
        .expect("save")
        .version
        .expect("version")
}

#[tokio::test]
async fn restore_brackets_the_change_with_two_versions() {
    let state = state();
    let page = create_page(&state, "History", ContentFormat::Html).await;
    let first = save_content(&state, &page, "<p>A</p>").await;
    save_content(&state, &page, "<p>B</p>").await;

    let outcome = state
        .coordinator
        .restore("restorer", page.id, first.id)
        .await
        .expect("restore");

    assert_eq!(outcome.page.content, "<p>A</p>");
    assert_eq!(outcome.pre_restore.version_number, 3);
    assert_eq!(outcome.pre_restore.content, "<p>B</p>");
    assert_eq!(outcome.pre_restore.restore_note, None);
    assert_eq!(outcome.post_restore.version_number, 4);
    assert_eq!(outcome.post_restore.content, "<p>A</p>");
    assert_eq!(
        outcome.post_restore.restore_note.as_deref(),
        Some("restored from v1")
    );
    assert_eq!(outcome.post_restore.created_by, "restorer");

    // Restoring the pre-restore snapshot undoes the restore.
    let undo = state
        .coordinator
        .restore(ACTOR, page.id, outcome.pre_restore.id)
        .await
        .expect("undo restore");
    assert_eq!(undo.page.content, "<p>B</p>");
    assert_eq!(
        undo.post_restore.restore_note.as_deref(),
        Some("restored from v3")
    );
}

#[tokio::test]
async fn restore_rejects_versions_of_other_pages() {
    let state = state();
    let page = create_page(&state, "One", ContentFormat::Html).await;
    let other = create_page(&state, "Two", ContentFormat::Html).await;
    let foreign = save_content(&state, &other, "<p>other</p>").await;

    let err = state
        .versions
        .restore(ACTOR, page.id, foreign.id)
        .await
        .expect_err("foreign version");
    assert!(matches!(err, VersionError::VersionNotFound));

    let err = state
        .versions
        .restore(ACTOR, page.id, Uuid::new_v4())
        .await
        .expect_err("unknown version");
    assert!(matches!(err, VersionError::VersionNotFound));

    let versions = state.versions.list_for(page.id).await.expect("versions");
    assert!(versions.is_empty(), "a failed restore writes nothing");
}

#[tokio::test(start_paused = true)]
async fn restore_is_refused_while_a_draft_is_pending() {
    let state = state();
    let page = create_page(&state, "Pending", ContentFormat::Html).await;
    let first = save_content(&state, &page, "<p>A</p>").await;

    state
        .coordinator
        .edit(ACTOR, page.id, draft(&page, "Pending", "<p>unsaved</p>"))
        .await
        .expect("stage edit");

    let err = state
        .coordinator
        .restore(ACTOR, page.id, first.id)
        .await
        .expect_err("draft pending");
    assert!(matches!(err, SaveError::UnsavedChanges));

    state.coordinator.close(page.id).await;
    state
        .coordinator
        .restore(ACTOR, page.id, first.id)
        .await
        .expect("restore after discarding the draft");
}

#[tokio::test]
async fn block_ops_apply_all_or_nothing() {
    let state = state();
    let page = create_page(&state, "Blocks", ContentFormat::Blocks).await;

    let view = state
        .coordinator
        .edit_blocks(
            ACTOR,
            page.id,
            vec![
                BlockOp::Add {
                    type_id: "hero".into(),
                },
                BlockOp::Add {
                    type_id: "richtext".into(),
                },
                BlockOp::MoveUp { index: 1 },
            ],
        )
        .await
        .expect("apply ops");
    let types: Vec<&str> = view.blocks.iter().map(|b| b.type_id.as_str()).collect();
    assert_eq!(types, ["richtext", "hero"]);
    assert_eq!(view.session.revision, 1);

    let err = state
        .coordinator
        .edit_blocks(
            ACTOR,
            page.id,
            vec![BlockOp::Clear, BlockOp::Remove { index: 0 }],
        )
        .await
        .expect_err("remove on an empty list");
    assert!(matches!(err, SaveError::Blocks(_)));

    let staged = state.coordinator.draft(page.id).await.expect("draft kept");
    assert!(staged.content.contains("richtext"));
    assert!(staged.content.contains("hero"));
    assert_eq!(state.coordinator.status(page.id).await.revision, 1);
}

#[tokio::test]
async fn block_ops_refuse_html_pages() {
    let state = state();
    let page = create_page(&state, "Legacy", ContentFormat::Html).await;
    save_content(&state, &page, "<p>hand written</p>").await;

    let err = state
        .coordinator
        .edit_blocks(
            ACTOR,
            page.id,
            vec![BlockOp::Add {
                type_id: "hero".into(),
            }],
        )
        .await
        .expect_err("html page");
    assert!(matches!(err, SaveError::NotBlocks));
}

/// Delegates to the in-memory store but fails updates while `failing` is set.
struct FlakyWrites {
    inner: Arc<InMemoryRepositories>,
    failing: AtomicBool,
}

#[async_trait]
impl PagesWriteRepo for FlakyWrites {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        self.inner.create_page(params).await
    }

    async fn update_page(
        &self,
        params: UpdatePageParams,
        snapshot: Option<SnapshotParams>,
    ) -> Result<(PageRecord, Option<PageVersionRecord>), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RepoError::Timeout);
        }
        self.inner.update_page(params, snapshot).await
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_page(id).await
    }
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_keeps_the_session_dirty() {
    let repos = Arc::new(InMemoryRepositories::new());
    let writes = Arc::new(FlakyWrites {
        inner: repos.clone(),
        failing: AtomicBool::new(true),
    });
    let audit = AuditService::new(repos.clone());
    let pages = PageService::new(repos.clone(), writes.clone(), registry(), audit.clone());
    let versions = VersionService::new(repos.clone(), repos.clone(), audit);
    let coordinator = SaveCoordinator::new(pages.clone(), versions, DEBOUNCE);

    let page = pages
        .create(
            ACTOR,
            CreatePageCommand {
                title: "Flaky".into(),
                slug: None,
                content_format: ContentFormat::Html,
            },
        )
        .await
        .expect("create page");

    coordinator
        .edit(ACTOR, page.id, draft(&page, "Flaky", "<p>keep me</p>"))
        .await
        .expect("stage edit");
    past_debounce().await;

    let session = coordinator.status(page.id).await;
    assert_eq!(session.phase, SessionPhase::Dirty);
    assert!(session.last_error.is_some());
    assert_eq!(
        coordinator.draft(page.id).await.map(|d| d.content),
        Some("<p>keep me</p>".to_string())
    );

    writes.failing.store(false, Ordering::SeqCst);
    let outcome = coordinator
        .flush(page.id)
        .await
        .expect("flush")
        .expect("pending edits were written");
    assert_eq!(outcome.page.content, "<p>keep me</p>");
    assert!(outcome.version.is_none());
    assert_eq!(
        coordinator.status(page.id).await.phase,
        SessionPhase::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn settings_change_survives_a_staged_draft() {
    let state = state();
    let page = state
        .pages
        .create(
            ACTOR,
            CreatePageCommand {
                title: "About".into(),
                slug: Some("about".into()),
                content_format: ContentFormat::Html,
            },
        )
        .await
        .expect("create page");

    state
        .coordinator
        .edit(ACTOR, page.id, draft(&page, "About", "<p>x</p>"))
        .await
        .expect("stage edit");

    let updated = state
        .coordinator
        .update_settings(
            ACTOR,
            page.id,
            UpdateSettingsCommand {
                title: Some("About Us".into()),
                slug: Some("about-us".into()),
                is_published: Some(true),
                ..UpdateSettingsCommand::default()
            },
        )
        .await
        .expect("update settings");
    assert_eq!(updated.slug, "about-us");

    let staged = state.coordinator.draft(page.id).await.expect("draft kept");
    assert_eq!(staged.slug, "about-us");
    assert_eq!(staged.content, "<p>x</p>");

    past_debounce().await;

    let stored = state.pages.find(page.id).await.expect("page");
    assert_eq!(stored.slug, "about-us");
    assert_eq!(stored.title, "About Us");
    assert!(stored.is_published);
    assert_eq!(stored.content, "<p>x</p>");
}

/// Delegates to the in-memory store; the first update waits for `release`.
struct GatedWrites {
    inner: Arc<InMemoryRepositories>,
    gated: AtomicBool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl PagesWriteRepo for GatedWrites {
    async fn create_page(&self, params: CreatePageParams) -> Result<PageRecord, RepoError> {
        self.inner.create_page(params).await
    }

    async fn update_page(
        &self,
        params: UpdatePageParams,
        snapshot: Option<SnapshotParams>,
    ) -> Result<(PageRecord, Option<PageVersionRecord>), RepoError> {
        if self.gated.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.update_page(params, snapshot).await
    }

    async fn delete_page(&self, id: Uuid) -> Result<(), RepoError> {
        self.inner.delete_page(id).await
    }
}

#[tokio::test(start_paused = true)]
async fn edit_during_a_save_is_kept_and_autosaved() {
    let repos = Arc::new(InMemoryRepositories::new());
    let writes = Arc::new(GatedWrites {
        inner: repos.clone(),
        gated: AtomicBool::new(true),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let audit = AuditService::new(repos.clone());
    let pages = PageService::new(repos.clone(), writes.clone(), registry(), audit.clone());
    let versions = VersionService::new(repos.clone(), repos.clone(), audit);
    let coordinator = SaveCoordinator::new(pages.clone(), versions.clone(), DEBOUNCE);

    let page = pages
        .create(
            ACTOR,
            CreatePageCommand {
                title: "Busy".into(),
                slug: None,
                content_format: ContentFormat::Html,
            },
        )
        .await
        .expect("create page");

    let page_id = page.id;
    let in_flight = tokio::spawn({
        let coordinator = coordinator.clone();
        let command = draft(&page, "Busy", "<p>first</p>");
        async move { coordinator.save(ACTOR, page_id, Some(command)).await }
    });
    writes.entered.notified().await;
    assert_eq!(coordinator.status(page.id).await.phase, SessionPhase::Saving);

    let staged = coordinator
        .edit(ACTOR, page.id, draft(&page, "Busy", "<p>second</p>"))
        .await
        .expect("stage edit mid-save");
    assert_eq!(staged.phase, SessionPhase::Saving);
    assert_eq!(staged.revision, 2);

    writes.release.notify_one();
    let outcome = in_flight
        .await
        .expect("save task")
        .expect("explicit save");
    assert_eq!(outcome.page.content, "<p>first</p>");

    let session = coordinator.status(page.id).await;
    assert_eq!(session.phase, SessionPhase::Dirty);
    assert_eq!(session.saved_revision, 1);
    assert!(session.saved_revision < session.revision);
    assert_eq!(
        coordinator.draft(page.id).await.map(|d| d.content),
        Some("<p>second</p>".to_string())
    );

    past_debounce().await;

    let stored = pages.find(page.id).await.expect("page");
    assert_eq!(stored.content, "<p>second</p>");
    assert_eq!(coordinator.status(page.id).await.phase, SessionPhase::Idle);
    let history = versions.list_for(page.id).await.expect("versions");
    assert_eq!(history.len(), 1, "only the explicit save records a version");
}

fn hero_title(content: &str) -> String {
    let document = BlockDocument::parse(content).expect("blocks content");
    document.blocks[0]
        .data
        .get("title")
        .and_then(|value| value.as_str())
        .expect("hero title")
        .to_string()
}

#[tokio::test(start_paused = true)]
async fn hero_page_scenario_from_first_save_to_restore() {
    let state = state();
    let page = state
        .pages
        .create(
            ACTOR,
            CreatePageCommand {
                title: "About".into(),
                slug: Some("about".into()),
                content_format: ContentFormat::Blocks,
            },
        )
        .await
        .expect("create page");

    state
        .coordinator
        .edit_blocks(
            ACTOR,
            page.id,
            vec![BlockOp::Add {
                type_id: "hero".into(),
            }],
        )
        .await
        .expect("add hero");
    let first = state
        .coordinator
        .save(ACTOR, page.id, None)
        .await
        .expect("first explicit save")
        .version
        .expect("version");
    assert_eq!(first.version_number, 1);
    assert_eq!(hero_title(&first.content), "Welcome");

    state
        .coordinator
        .edit_blocks(
            ACTOR,
            page.id,
            vec![BlockOp::UpdateField {
                index: 0,
                field: "title".into(),
                value: json!("About our co-op"),
            }],
        )
        .await
        .expect("edit hero title");
    past_debounce().await;

    let live = state.pages.find(page.id).await.expect("page");
    assert_eq!(hero_title(&live.content), "About our co-op");
    let history = state.versions.list_for(page.id).await.expect("versions");
    assert_eq!(history.len(), 1, "autosave leaves history alone");

    state
        .coordinator
        .save(ACTOR, page.id, None)
        .await
        .expect("second explicit save");
    let history = state.versions.list_for(page.id).await.expect("versions");
    assert_eq!(history.len(), 2);

    let restored = state
        .coordinator
        .restore(ACTOR, page.id, first.id)
        .await
        .expect("restore v1");
    let history = state.versions.list_for(page.id).await.expect("versions");
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].restore_note.as_deref(), Some("restored from v1"));
    assert_eq!(restored.page.title, first.title);
    assert_eq!(hero_title(&restored.page.content), "Welcome");
}

#[tokio::test]
async fn restore_and_saves_without_a_session_stay_serialised() {
    let state = state();
    let page = create_page(&state, "Racing", ContentFormat::Html).await;
    let first = save_content(&state, &page, "<p>A</p>").await;
    assert_eq!(state.coordinator.open_sessions(), 0);

    let (page_id, first_id) = (page.id, first.id);
    let restore = {
        let coordinator = state.coordinator.clone();
        async move { coordinator.restore(ACTOR, page_id, first_id).await.map(|_| ()) }
    };
    let save = {
        let coordinator = state.coordinator.clone();
        let command = draft(&page, "Racing", "<p>B</p>");
        async move { coordinator.save(ACTOR, page_id, Some(command)).await.map(|_| ()) }
    };
    let (restored, saved) = tokio::join!(restore, save);
    restored.expect("restore");
    saved.expect("save");

    let mut numbers: Vec<i32> = state
        .versions
        .list_for(page.id)
        .await
        .expect("versions")
        .iter()
        .map(|version| version.version_number)
        .collect();
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    assert_eq!(state.coordinator.open_sessions(), 0);
}
