//! Per-page edit sessions with debounced autosave and serialised writes.
//!
//! Every write to a page that goes through the coordinator holds that page's
//! write lock, so at most one save per page is in flight. Edits only touch the
//! session's draft and never wait on the lock; a save picks up whatever the
//! draft holds when the lock is acquired.

use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use metrics::counter;
use tessera_api_types::BlockOp;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::application::error::ErrorKind;
use crate::application::metrics::METRIC_AUTOSAVE_FAILURES;
use crate::application::pages::{
    PageError, PageService, SaveOutcome, SavePageCommand, UpdateSettingsCommand,
};
use crate::application::repos::RestoreOutcome;
use crate::application::versions::{VersionError, VersionService};
use crate::domain::blocks::{
    BlockDocument, BlockEditError, BlockInstance, BlockIssue, BlockWorkingCopy,
};
use crate::domain::entities::PageRecord;
use crate::domain::types::{ContentFormat, SaveMode, SessionPhase};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error(transparent)]
    Page(#[from] PageError),
    #[error(transparent)]
    Version(#[from] VersionError),
    #[error(transparent)]
    Blocks(#[from] BlockEditError),
    #[error("page stores html content; block edits need a blocks page")]
    NotBlocks,
    #[error("page has unsaved changes")]
    UnsavedChanges,
}

impl SaveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SaveError::Page(err) => err.kind(),
            SaveError::Version(err) => err.kind(),
            SaveError::Blocks(_) | SaveError::NotBlocks => ErrorKind::Validation,
            SaveError::UnsavedChanges => ErrorKind::Conflict,
        }
    }
}

/// Point-in-time view of an edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub page_id: Uuid,
    pub phase: SessionPhase,
    /// Number of edits staged so far.
    pub revision: u64,
    /// Latest revision written to the page.
    pub saved_revision: u64,
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    fn idle(page_id: Uuid) -> Self {
        Self {
            page_id,
            phase: SessionPhase::Idle,
            revision: 0,
            saved_revision: 0,
            last_error: None,
        }
    }
}

/// Result of applying block operations to a session's draft.
#[derive(Debug, Clone)]
pub struct WorkingCopyView {
    pub session: SessionSnapshot,
    pub blocks: Vec<BlockInstance>,
    pub issues: Vec<BlockIssue>,
}

struct EditSession {
    page_id: Uuid,
    write_lock: Mutex<()>,
    state: Mutex<SessionState>,
}

struct SessionState {
    phase: SessionPhase,
    draft: Option<SavePageCommand>,
    actor: String,
    revision: u64,
    saved_revision: u64,
    last_error: Option<String>,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
}

impl EditSession {
    fn new(page_id: Uuid) -> Self {
        Self {
            page_id,
            write_lock: Mutex::new(()),
            state: Mutex::new(SessionState {
                phase: SessionPhase::Idle,
                draft: None,
                actor: String::new(),
                revision: 0,
                saved_revision: 0,
                last_error: None,
                timer: None,
                timer_generation: 0,
            }),
        }
    }
}

impl SessionState {
    fn snapshot(&self, page_id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            page_id,
            phase: self.phase,
            revision: self.revision,
            saved_revision: self.saved_revision,
            last_error: self.last_error.clone(),
        }
    }

    fn is_settled(&self) -> bool {
        self.phase == SessionPhase::Idle
            && self.draft.is_none()
            && self.timer.is_none()
            && self.last_error.is_none()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    pages: PageService,
    versions: VersionService,
    sessions: DashMap<Uuid, Arc<EditSession>>,
    debounce: Duration,
}

#[derive(Clone)]
pub struct SaveCoordinator {
    inner: Arc<Inner>,
}

impl SaveCoordinator {
    pub fn new(pages: PageService, versions: VersionService, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                pages,
                versions,
                sessions: DashMap::new(),
                debounce,
            }),
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Stage a full working copy and restart the debounce window.
    pub async fn edit(
        &self,
        actor: &str,
        page_id: Uuid,
        command: SavePageCommand,
    ) -> Result<SessionSnapshot, SaveError> {
        self.inner.pages.find(page_id).await?;
        let session = self.session_for(page_id);
        let mut state = session.state.lock().await;
        self.stage(&session, &mut state, actor, command);
        Ok(state.snapshot(page_id))
    }

    /// Apply block operations to the draft, or to the live content when no
    /// draft is staged. Either every operation applies or none does.
    pub async fn edit_blocks(
        &self,
        actor: &str,
        page_id: Uuid,
        ops: Vec<BlockOp>,
    ) -> Result<WorkingCopyView, SaveError> {
        let page = self.inner.pages.find(page_id).await?;
        let session = self.session_for(page_id);
        let mut state = session.state.lock().await;

        let base = state
            .draft
            .clone()
            .unwrap_or_else(|| SavePageCommand::from_record(&page));
        let format = base.content_format.unwrap_or(page.content_format);
        if format == ContentFormat::Html && !base.content.trim().is_empty() {
            return Err(SaveError::NotBlocks);
        }

        let document = BlockDocument::parse(&base.content)?;
        let mut working =
            BlockWorkingCopy::from_document(self.inner.pages.registry().clone(), document);
        for op in ops {
            apply_op(&mut working, op)?;
        }

        let command = SavePageCommand {
            content: working.to_document().to_content()?,
            content_format: Some(ContentFormat::Blocks),
            ..base
        };
        self.stage(&session, &mut state, actor, command);

        Ok(WorkingCopyView {
            session: state.snapshot(page_id),
            blocks: working.blocks().to_vec(),
            issues: working.issues(),
        })
    }

    /// Persist the page now and record a version. With `command` the draft is
    /// replaced first; without it the staged draft, or the live state when
    /// nothing is staged, is saved. Waits for any in-flight save of the page.
    pub async fn save(
        &self,
        actor: &str,
        page_id: Uuid,
        command: Option<SavePageCommand>,
    ) -> Result<SaveOutcome, SaveError> {
        self.inner.pages.find(page_id).await?;
        let session = self.session_for(page_id);
        if let Some(command) = command {
            let mut state = session.state.lock().await;
            self.stage(&session, &mut state, actor, command);
        }

        let outcome = self
            .run_save(&session, SaveMode::Explicit, Some(actor))
            .await;
        self.release(&session);
        // An explicit save never skips.
        outcome?.ok_or(SaveError::Page(PageError::NotFound))
    }

    /// Run a pending autosave immediately. Returns `None` when there was
    /// nothing unsaved.
    pub async fn flush(&self, page_id: Uuid) -> Result<Option<SaveOutcome>, SaveError> {
        let Some(session) = self.existing(page_id) else {
            return Ok(None);
        };
        self.autosave(&session).await
    }

    /// Flush every dirty session. Used on shutdown.
    pub async fn flush_all(&self) {
        let sessions: Vec<Arc<EditSession>> = self
            .inner
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        // Sessions are independent; failures are logged by `autosave`.
        join_all(sessions.iter().map(|session| self.autosave(session))).await;
    }

    /// Restore a version while holding the page's write lock. Refused while
    /// the session has unsaved edits.
    pub async fn restore(
        &self,
        actor: &str,
        page_id: Uuid,
        version_id: Uuid,
    ) -> Result<RestoreOutcome, SaveError> {
        let session = self.session_for(page_id);
        let result = {
            let _guard = session.write_lock.lock().await;
            if session.state.lock().await.draft.is_some() {
                Err(SaveError::UnsavedChanges)
            } else {
                self.inner
                    .versions
                    .restore(actor, page_id, version_id)
                    .await
                    .map_err(SaveError::from)
            }
        };
        self.release(&session);
        result
    }

    /// Apply a settings change while holding the page's write lock. A staged
    /// draft takes over every committed field, so the next save keeps it.
    pub async fn update_settings(
        &self,
        actor: &str,
        page_id: Uuid,
        command: UpdateSettingsCommand,
    ) -> Result<PageRecord, SaveError> {
        let session = self.session_for(page_id);
        let result = {
            let _guard = session.write_lock.lock().await;
            let result = self
                .inner
                .pages
                .update_settings(actor, page_id, command.clone())
                .await;
            if let Ok(page) = &result {
                let mut state = session.state.lock().await;
                if let Some(draft) = state.draft.as_mut() {
                    draft.rebase_settings(&command, page);
                }
            }
            result
        };
        self.release(&session);
        Ok(result?)
    }

    /// Delete the page and drop its session, discarding any draft.
    pub async fn delete(&self, actor: &str, page_id: Uuid) -> Result<(), SaveError> {
        let session = self.session_for(page_id);
        let result = {
            let _guard = session.write_lock.lock().await;
            let result = self.inner.pages.delete(actor, page_id).await;
            if result.is_ok() {
                session.state.lock().await.cancel_timer();
                self.inner.sessions.remove(&page_id);
            }
            result
        };
        self.release(&session);
        Ok(result?)
    }

    pub async fn status(&self, page_id: Uuid) -> SessionSnapshot {
        match self.existing(page_id) {
            Some(session) => session.state.lock().await.snapshot(page_id),
            None => SessionSnapshot::idle(page_id),
        }
    }

    /// The staged draft, if any.
    pub async fn draft(&self, page_id: Uuid) -> Option<SavePageCommand> {
        let session = self.existing(page_id)?;
        let state = session.state.lock().await;
        state.draft.clone()
    }

    /// End the session. Unsaved edits are discarded.
    pub async fn close(&self, page_id: Uuid) -> SessionSnapshot {
        let Some((_, session)) = self.inner.sessions.remove(&page_id) else {
            return SessionSnapshot::idle(page_id);
        };
        let mut state = session.state.lock().await;
        state.cancel_timer();
        if state.draft.is_some() {
            debug!(
                target = "tessera::autosave",
                page_id = %page_id,
                "closing session with unsaved edits"
            );
        }
        state.snapshot(page_id)
    }

    fn session_for(&self, page_id: Uuid) -> Arc<EditSession> {
        self.inner
            .sessions
            .entry(page_id)
            .or_insert_with(|| Arc::new(EditSession::new(page_id)))
            .value()
            .clone()
    }

    /// Number of sessions currently tracked.
    pub fn open_sessions(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Evict a settled session no other task holds. `remove_if` keeps the
    /// shard locked, so `session_for` cannot hand out a clone meanwhile.
    fn release(&self, session: &Arc<EditSession>) {
        self.inner.sessions.remove_if(&session.page_id, |_, entry| {
            Arc::ptr_eq(entry, session)
                && Arc::strong_count(entry) == 2
                && entry.state.try_lock().is_ok_and(|state| state.is_settled())
        });
    }

    fn existing(&self, page_id: Uuid) -> Option<Arc<EditSession>> {
        self.inner
            .sessions
            .get(&page_id)
            .map(|entry| entry.value().clone())
    }

    fn stage(
        &self,
        session: &Arc<EditSession>,
        state: &mut SessionState,
        actor: &str,
        command: SavePageCommand,
    ) {
        state.draft = Some(command);
        state.actor = actor.to_string();
        state.revision += 1;
        if state.phase != SessionPhase::Saving {
            state.phase = SessionPhase::Dirty;
        }
        self.arm_timer(session, state);
    }

    fn arm_timer(&self, session: &Arc<EditSession>, state: &mut SessionState) {
        state.cancel_timer();
        state.timer_generation += 1;

        let generation = state.timer_generation;
        let page_id = session.page_id;
        let debounce = self.inner.debounce;
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);

        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let Some(inner) = inner.upgrade() else {
                return;
            };
            SaveCoordinator { inner }
                .fire_timer(page_id, generation)
                .await;
        }));
    }

    async fn fire_timer(&self, page_id: Uuid, generation: u64) {
        let Some(session) = self.existing(page_id) else {
            return;
        };
        {
            let mut state = session.state.lock().await;
            if state.timer_generation != generation {
                return;
            }
            // Detach rather than abort: this task owns the handle.
            state.timer = None;
        }
        let _ = self.autosave(&session).await;
    }

    async fn autosave(&self, session: &Arc<EditSession>) -> Result<Option<SaveOutcome>, SaveError> {
        let result = self.run_save(session, SaveMode::Autosave, None).await;
        self.release(session);
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                counter!(METRIC_AUTOSAVE_FAILURES).increment(1);
                warn!(
                    target = "tessera::autosave",
                    page_id = %session.page_id,
                    error = %err,
                    "autosave failed; edits kept"
                );
                Err(err)
            }
        }
    }

    async fn run_save(
        &self,
        session: &Arc<EditSession>,
        mode: SaveMode,
        actor: Option<&str>,
    ) -> Result<Option<SaveOutcome>, SaveError> {
        let _guard = session.write_lock.lock().await;

        let (draft, revision, staged_by) = {
            let mut state = session.state.lock().await;
            if mode == SaveMode::Autosave
                && (state.phase != SessionPhase::Dirty || state.revision == state.saved_revision)
            {
                return Ok(None);
            }
            state.phase = SessionPhase::Saving;
            (state.draft.clone(), state.revision, state.actor.clone())
        };

        let actor = actor.map(str::to_string).unwrap_or(staged_by);
        let result = self.write(session.page_id, &actor, draft.clone(), mode).await;

        let mut state = session.state.lock().await;
        match result {
            Ok(outcome) => {
                state.saved_revision = revision;
                state.last_error = None;
                if state.revision > revision {
                    state.phase = SessionPhase::Dirty;
                } else {
                    state.phase = SessionPhase::Idle;
                    state.draft = None;
                    state.cancel_timer();
                }
                Ok(Some(outcome))
            }
            Err(err) => {
                state.phase = if state.draft.is_some() {
                    SessionPhase::Dirty
                } else {
                    SessionPhase::Idle
                };
                state.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn write(
        &self,
        page_id: Uuid,
        actor: &str,
        draft: Option<SavePageCommand>,
        mode: SaveMode,
    ) -> Result<SaveOutcome, SaveError> {
        let command = match draft {
            Some(command) => command,
            None => SavePageCommand::from_record(&self.inner.pages.find(page_id).await?),
        };
        Ok(self.inner.pages.save(actor, page_id, command, mode).await?)
    }
}

fn apply_op(working: &mut BlockWorkingCopy, op: BlockOp) -> Result<(), BlockEditError> {
    match op {
        BlockOp::Add { type_id } => working.add_block(&type_id).map(|_| ()),
        BlockOp::UpdateField {
            index,
            field,
            value,
        } => working.update_field(index, &field, &value),
        BlockOp::MoveUp { index } => working.move_up(index),
        BlockOp::MoveDown { index } => working.move_down(index),
        BlockOp::Move { from, to } => working.move_to(from, to),
        BlockOp::Remove { index } => working.remove(index).map(|_| ()),
        BlockOp::Clear => {
            working.clear();
            Ok(())
        }
    }
}
