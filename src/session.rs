//! Canvas session: binds the synchronous engine to the async backend.
//!
//! DESIGN
//! ======
//! The engine never performs I/O; it returns [`Action`]s. The session owns
//! the engine, the persistence API and the image pipeline, and dispatches
//! those actions: deletes, undo/redo and flushes are awaited against the
//! API, image commands go to the pipeline, and any follow-up actions the
//! engine returns are pushed back onto the same worklist until it drains.
//!
//! Failures that the user should hear about come back as [`Notice`]s; the
//! canvas itself always stays usable.

use std::collections::VecDeque;
use std::sync::Arc;

use canvas::engine::{Action, Engine};
use canvas::entity::EntityId;
use canvas::history::UndoRecord;
use tokio::task::JoinHandle;

use crate::api::{ApiError, CanvasApi, ProjectId};
use crate::config::SessionConfig;
use crate::flush::{FlushReport, send_writes};
use crate::images::{ImageEvent, ImageFetcher, ImagePipeline};

// =============================================================================
// TYPES
// =============================================================================

/// Errors surfaced by session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The operation needs an open project.
    #[error("no project is open")]
    NoProject,
}

/// A user-facing failure that did not abort the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The entity stayed on the canvas and was reselected.
    DeleteFailed { id: EntityId, error: String },
    /// The entity stayed deleted; its undo step was consumed anyway.
    RestoreFailed { id: EntityId, error: String },
}

// =============================================================================
// SESSION
// =============================================================================

pub struct CanvasSession {
    api: Arc<dyn CanvasApi>,
    engine: Engine,
    images: ImagePipeline,
    project: Option<ProjectId>,
    cursor: String,
    redraw: bool,
}

impl CanvasSession {
    #[must_use]
    pub fn new(api: Arc<dyn CanvasApi>, fetcher: Arc<dyn ImageFetcher>, config: &SessionConfig) -> Self {
        Self {
            api,
            engine: Engine::new(config.engine_config()),
            images: ImagePipeline::new(fetcher),
            project: None,
            cursor: String::from("default"),
            redraw: false,
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Direct engine access for hosts that dispatch the returned actions via [`Self::dispatch`].
    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    #[must_use]
    pub fn api(&self) -> Arc<dyn CanvasApi> {
        Arc::clone(&self.api)
    }

    #[must_use]
    pub fn images(&self) -> &ImagePipeline {
        &self.images
    }

    #[must_use]
    pub fn project(&self) -> Option<ProjectId> {
        self.project
    }

    #[must_use]
    pub fn cursor(&self) -> &str {
        &self.cursor
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.redraw)
    }

    // --- Project lifecycle ---

    /// Load `project` into the engine.
    ///
    /// An unreachable backend opens an empty in-memory canvas instead of
    /// failing; writes made while disconnected stay pending.
    ///
    /// # Errors
    ///
    /// Any other API error; the previous state is left untouched.
    pub async fn open(&mut self, project: ProjectId) -> Result<Vec<Notice>, SessionError> {
        let snapshot = match self.api.list_entities(project).await {
            Ok(snapshot) => snapshot,
            Err(ApiError::Disconnected(reason)) => {
                tracing::warn!(%project, %reason, "backend unreachable, opening empty canvas");
                crate::api::ProjectSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        self.images.reset();
        self.project = Some(project);
        tracing::info!(%project, entities = snapshot.entities.len(), "project opened");
        let actions = self.engine.load_project(snapshot.entities, snapshot.viewport);
        Ok(self.dispatch(actions).await)
    }

    /// Persist the current project, then open another.
    ///
    /// # Errors
    ///
    /// Propagates [`Self::open`] failures for the new project.
    pub async fn switch_project(&mut self, project: ProjectId) -> Result<Vec<Notice>, SessionError> {
        self.leave_project().await;
        self.open(project).await
    }

    /// Persist and drop the current project.
    pub async fn unmount(&mut self) {
        self.leave_project().await;
    }

    async fn leave_project(&mut self) {
        let Some(project) = self.project else {
            return;
        };
        let report = self.flush_positions().await;
        if let Err(e) = self.save_viewport().await {
            tracing::warn!(%project, error = %e, "viewport save failed on leave");
        }
        tracing::info!(%project, flushed = report.flushed, failed = report.failed, "project closed");

        let cancels = self.engine.unload();
        self.dispatch(cancels).await;
        self.images.reset();
        self.project = None;
    }

    /// Persist everything without waiting: the page may be going away.
    ///
    /// Pending writes are not acknowledged locally; if the page comes back
    /// they are sent again, which is harmless.
    pub fn page_hide(&self) -> Option<JoinHandle<FlushReport>> {
        let project = self.project?;
        let api = Arc::clone(&self.api);
        let writes = self.engine.pending_writes();
        let viewport = self.engine.camera();
        Some(tokio::spawn(async move {
            let sent = send_writes(api.as_ref(), &writes).await;
            if let Err(e) = api.save_viewport(project, viewport).await {
                tracing::warn!(%project, error = %e, "viewport save failed on page hide");
            }
            FlushReport { flushed: sent.len(), failed: writes.len() - sent.len() }
        }))
    }

    // --- Persistence ---

    /// Send every pending position; only confirmed revisions are cleared.
    pub async fn flush_positions(&mut self) -> FlushReport {
        let writes = self.engine.pending_writes();
        if writes.is_empty() {
            return FlushReport::default();
        }
        let sent = send_writes(self.api.as_ref(), &writes).await;
        for write in &sent {
            self.engine.acknowledge_write(write);
        }
        FlushReport { flushed: sent.len(), failed: writes.len() - sent.len() }
    }

    /// # Errors
    ///
    /// [`SessionError::NoProject`] when nothing is open, or the API error.
    pub async fn save_viewport(&self) -> Result<(), SessionError> {
        let project = self.project.ok_or(SessionError::NoProject)?;
        self.api.save_viewport(project, self.engine.camera()).await?;
        Ok(())
    }

    // --- Dispatch ---

    /// Run an engine handler and dispatch whatever it returns.
    pub async fn apply<F>(&mut self, handler: F) -> Vec<Notice>
    where
        F: FnOnce(&mut Engine) -> Vec<Action>,
    {
        let actions = handler(&mut self.engine);
        self.dispatch(actions).await
    }

    /// Batch-delete `ids` on the backend and record one undo step.
    pub async fn delete_entities(&mut self, ids: Vec<EntityId>) -> Vec<Notice> {
        self.dispatch(vec![Action::DeleteRequested(ids)]).await
    }

    pub async fn undo(&mut self) -> Vec<Notice> {
        self.dispatch(vec![Action::UndoRequested]).await
    }

    pub async fn redo(&mut self) -> Vec<Notice> {
        self.dispatch(vec![Action::RedoRequested]).await
    }

    /// Execute `actions` and every follow-up action they produce.
    pub async fn dispatch(&mut self, actions: Vec<Action>) -> Vec<Notice> {
        let mut queue: VecDeque<Action> = actions.into();
        let mut notices = Vec::new();
        while let Some(action) = queue.pop_front() {
            let follow_up = match action {
                Action::RenderNeeded => {
                    self.redraw = true;
                    Vec::new()
                }
                Action::SetCursor(cursor) => {
                    self.cursor = cursor;
                    Vec::new()
                }
                Action::ViewportCommitted(viewport) => {
                    tracing::trace!(scale = viewport.scale, "viewport committed");
                    Vec::new()
                }
                Action::PositionsQueued(ids) => {
                    tracing::debug!(count = ids.len(), "positions queued");
                    Vec::new()
                }
                Action::Image(command) => {
                    self.images.execute(command);
                    Vec::new()
                }
                Action::DeleteRequested(ids) => self.run_delete(&ids, &mut notices).await,
                Action::UndoRequested => self.run_undo(&mut notices).await,
                Action::RedoRequested => self.run_redo(&mut notices).await,
            };
            queue.extend(follow_up);
        }
        notices
    }

    async fn run_delete(&mut self, ids: &[EntityId], notices: &mut Vec<Notice>) -> Vec<Action> {
        let (deleted, failed) = self.delete_each(ids, notices).await;
        let mut actions = self.engine.confirm_deleted(&deleted);
        if !failed.is_empty() {
            actions.extend(self.engine.delete_failed(&failed));
        }
        tracing::info!(deleted = deleted.len(), failed = failed.len(), "delete finished");
        actions
    }

    async fn run_undo(&mut self, notices: &mut Vec<Notice>) -> Vec<Action> {
        let Some(record) = self.engine.begin_undo() else {
            return Vec::new();
        };
        let restored = self.restore_each(&record, notices).await;
        tracing::info!(restored = restored.len(), of = record.members().len(), "undo finished");
        self.engine.finish_undo(&record, &restored)
    }

    async fn run_redo(&mut self, notices: &mut Vec<Notice>) -> Vec<Action> {
        let Some(record) = self.engine.begin_redo() else {
            return Vec::new();
        };
        let (deleted, _failed) = self.delete_each(&record.entity_ids(), notices).await;
        tracing::info!(deleted = deleted.len(), of = record.members().len(), "redo finished");
        self.engine.finish_redo(&record, &deleted)
    }

    /// Delete each id independently; returns `(deleted, failed)`.
    async fn delete_each(&self, ids: &[EntityId], notices: &mut Vec<Notice>) -> (Vec<EntityId>, Vec<EntityId>) {
        let mut deleted = Vec::with_capacity(ids.len());
        let mut failed = Vec::new();
        for id in ids {
            match self.api.delete_entity(*id).await {
                Ok(()) => deleted.push(*id),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "delete failed");
                    notices.push(Notice::DeleteFailed { id: *id, error: e.to_string() });
                    failed.push(*id);
                }
            }
        }
        (deleted, failed)
    }

    async fn restore_each(&self, record: &UndoRecord, notices: &mut Vec<Notice>) -> Vec<EntityId> {
        let mut restored = Vec::new();
        for id in record.entity_ids() {
            match self.api.restore_entity(id).await {
                Ok(()) => restored.push(id),
                Err(e) => {
                    tracing::warn!(%id, error = %e, "restore failed");
                    notices.push(Notice::RestoreFailed { id, error: e.to_string() });
                }
            }
        }
        restored
    }

    // --- Images ---

    /// Feed every finished image fetch into the engine without waiting.
    pub async fn poll_images(&mut self) -> usize {
        let events = self.images.drain();
        let count = events.len();
        for event in events {
            self.absorb_image(&event).await;
        }
        count
    }

    /// Wait for the next image fetch to finish and feed it into the engine.
    pub async fn next_image(&mut self) -> Option<ImageEvent> {
        let event = self.images.next().await?;
        self.absorb_image(&event).await;
        Some(event)
    }

    async fn absorb_image(&mut self, event: &ImageEvent) {
        let actions = match event {
            ImageEvent::Loaded { id, full, .. } => self.engine.on_image_loaded(id, *full),
            ImageEvent::Failed { id, full, .. } => self.engine.on_image_failed(id, *full),
        };
        self.dispatch(actions).await;
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
