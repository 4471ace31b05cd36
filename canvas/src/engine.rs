use crate::consts::{FOCUS_FILL, PREFETCH_MARGIN_PX, UNDO_CAPACITY, VIEW_ANIMATION_MS, WHEEL_IDLE_MS, WHEEL_ZOOM_STEP};
use crate::drag::DragSession;
use crate::entity::{Entity, EntityId, EntityStore};
use crate::geom::{Point, Rect};
use crate::history::{DeleteRecord, UndoHistory, UndoRecord};
use crate::hit;
use crate::input::{Button, Key, Modifiers, WheelDelta};
use crate::loader::{ImageLoader, LoadCommand, LoadState};
use crate::pending::{PendingPositions, PendingWrite};
use crate::placement::{PlacementAllocator, PlacementConfig};
use crate::selection::{EntityPress, InteractionState, SelectionEngine, ToolMode};
use crate::viewport::{Viewport, ViewportController, clamp_scale};

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Actions returned from input handlers for the host to process.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    RenderNeeded,
    SetCursor(String),
    /// The committed viewport settled at this value.
    ViewportCommitted(Viewport),
    /// The user asked to delete these entities. They stay loaded until confirmed.
    DeleteRequested(Vec<EntityId>),
    UndoRequested,
    RedoRequested,
    /// New positions entered the pending map.
    PositionsQueued(Vec<EntityId>),
    Image(LoadCommand),
}

/// Where a batch of new entities came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementKind {
    /// Output of an image generation job; the view re-centers on it.
    Generation,
    /// User upload; placed without moving the view.
    Upload,
}

/// Tuning knobs for an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub wheel_step: f64,
    pub wheel_idle_ms: f64,
    pub view_animation_ms: f64,
    pub undo_capacity: usize,
    pub prefetch_margin: f64,
    pub placement: PlacementConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wheel_step: WHEEL_ZOOM_STEP,
            wheel_idle_ms: WHEEL_IDLE_MS,
            view_animation_ms: VIEW_ANIMATION_MS,
            undo_capacity: UNDO_CAPACITY,
            prefetch_margin: PREFETCH_MARGIN_PX,
            placement: PlacementConfig::default(),
        }
    }
}

/// One entity as the renderer should draw it this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneItem {
    pub id: EntityId,
    /// Canvas-space bounds, with any live drag applied.
    pub bounds: Rect,
    pub selected: bool,
    pub load: LoadState,
}

/// The canvas engine: all interaction state for one open project.
///
/// Host-agnostic and synchronous. Every handler runs to completion and
/// returns the [`Action`]s the host must carry out (persistence, image
/// fetches, cursor, redraw).
pub struct Engine {
    pub store: EntityStore,
    pub viewport: ViewportController,
    pub selection: SelectionEngine,
    pub pending: PendingPositions,
    pub history: UndoHistory,
    pub loader: ImageLoader,
    placement: PlacementAllocator,
    /// Viewport to return to when leaving the focused view.
    focus_return: Option<Viewport>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            store: EntityStore::new(),
            viewport: ViewportController::new(config.wheel_step, config.wheel_idle_ms),
            selection: SelectionEngine::new(),
            pending: PendingPositions::new(),
            history: UndoHistory::new(config.undo_capacity),
            loader: ImageLoader::new(config.prefetch_margin),
            placement: PlacementAllocator::new(config.placement),
            focus_return: None,
            config,
        }
    }

    // --- Project lifecycle ---

    /// Replace the loaded project.
    ///
    /// The saved viewport is restored when present; otherwise the view is
    /// centered on the newest entity at scale 1 (identity when empty).
    /// Selection, pending writes, undo history and the image loader reset.
    pub fn load_project(&mut self, entities: Vec<Entity>, saved: Option<Viewport>) -> Vec<Action> {
        let mut actions = self.unload();
        self.store.load_snapshot(entities);
        let viewport = saved.unwrap_or_else(|| self.initial_viewport());
        self.viewport.restore(viewport);
        tracing::debug!(entities = self.store.len(), restored = saved.is_some(), "project loaded");
        actions.extend(self.refresh_images());
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Drop all per-project state, returning cancels for in-flight image fetches.
    pub fn unload(&mut self) -> Vec<Action> {
        self.selection.reset();
        self.pending.clear();
        self.history.clear();
        self.focus_return = None;
        self.store.load_snapshot(Vec::new());
        self.loader.reset().into_iter().map(Action::Image).collect()
    }

    fn initial_viewport(&self) -> Viewport {
        let (width, height) = self.viewport.size();
        match self.store.newest() {
            Some(newest) => Viewport::centered_on(newest.bounds().center(), width, height, 1.0),
            None => Viewport::default(),
        }
    }

    pub fn set_viewport_size(&mut self, width: f64, height: f64) -> Vec<Action> {
        self.viewport.set_size(width, height);
        let mut actions = self.refresh_images();
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Placement ---

    /// Position and insert newly created entities.
    ///
    /// Every box uses the largest width and height in the batch, so the grid
    /// stays regular. Generation batches animate the view onto the centroid.
    pub fn place_batch(&mut self, entities: Vec<Entity>, kind: PlacementKind, now_ms: f64) -> Vec<Action> {
        if entities.is_empty() {
            return Vec::new();
        }
        let width = entities.iter().map(|e| e.width).fold(0.0, f64::max);
        let height = entities.iter().map(|e| e.height).fold(0.0, f64::max);
        let occupied: Vec<Rect> = self.store.ids().iter().filter_map(|id| self.effective_bounds(id)).collect();
        let positions = self.placement.allocate(&occupied, width, height, entities.len());

        let mut ids = Vec::with_capacity(entities.len());
        for (mut entity, position) in entities.into_iter().zip(positions.iter().copied()) {
            entity.x = position.x;
            entity.y = position.y;
            self.pending.record(entity.id, position);
            ids.push(entity.id);
            self.store.insert(entity);
        }
        tracing::debug!(count = ids.len(), ?kind, "placed batch");

        if kind == PlacementKind::Generation
            && let Some(centroid) = PlacementAllocator::centroid(&positions, width, height)
        {
            let (sw, sh) = self.viewport.size();
            let target = PlacementAllocator::recenter_target(self.viewport.committed(), centroid, sw, sh);
            self.viewport.animate_to(target, now_ms, self.config.view_animation_ms);
        }

        let mut actions = vec![Action::PositionsQueued(ids)];
        actions.extend(self.refresh_images());
        actions.push(Action::RenderNeeded);
        actions
    }

    // --- Deletes / undo ---

    /// The backend confirmed these deletes: unload them and record one undo step.
    pub fn confirm_deleted(&mut self, ids: &[EntityId]) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(entity) = self.remove_entity(id, &mut actions) {
                records.push(DeleteRecord::from_entity(entity));
            }
        }
        if let Some(record) = UndoRecord::from_deleted(records) {
            self.history.push_delete(record);
        }
        self.selection.prune(&self.store);
        actions.push(Action::RenderNeeded);
        actions
    }

    /// The backend refused these deletes: they stay loaded and are reselected.
    pub fn delete_failed(&mut self, ids: &[EntityId]) -> Vec<Action> {
        self.selection.reselect(ids.iter().copied(), &self.store);
        vec![Action::RenderNeeded]
    }

    /// Pop the next undo step. `None` when empty or another step is in flight.
    pub fn begin_undo(&mut self) -> Option<UndoRecord> {
        self.history.begin_undo()
    }

    /// Re-insert the members of `record` the backend restored.
    ///
    /// Restored entities come back at their snapshot position; nothing is
    /// queued for flush.
    pub fn finish_undo(&mut self, record: &UndoRecord, restored: &[EntityId]) -> Vec<Action> {
        let subset = record.retain_ids(restored);
        if let Some(subset) = &subset {
            for member in subset.members() {
                let mut entity = member.snapshot.clone();
                entity.x = member.position.x;
                entity.y = member.position.y;
                self.store.insert(entity);
            }
        }
        self.history.finish_undo(subset);
        let mut actions = self.refresh_images();
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Pop the next redo step. The host deletes its ids again.
    pub fn begin_redo(&mut self) -> Option<UndoRecord> {
        self.history.begin_redo()
    }

    /// Unload the members of `record` the backend deleted again and make them undoable.
    pub fn finish_redo(&mut self, record: &UndoRecord, deleted: &[EntityId]) -> Vec<Action> {
        let mut actions = Vec::new();
        let mut records = Vec::new();
        for member in record.members().iter().filter(|m| deleted.contains(&m.entity_id)) {
            let entity = self
                .remove_entity(&member.entity_id, &mut actions)
                .unwrap_or_else(|| member.snapshot.clone());
            records.push(DeleteRecord::from_entity(entity));
        }
        self.history.finish_redo(UndoRecord::from_deleted(records));
        self.selection.prune(&self.store);
        actions.push(Action::RenderNeeded);
        actions
    }

    fn remove_entity(&mut self, id: &EntityId, actions: &mut Vec<Action>) -> Option<Entity> {
        let entity = self.store.remove(id)?;
        self.pending.discard(id);
        if let Some(cancel) = self.loader.forget(id) {
            actions.push(Action::Image(cancel));
        }
        Some(entity)
    }

    // --- Pending positions ---

    /// Every queued write, oldest first.
    #[must_use]
    pub fn pending_writes(&self) -> Vec<PendingWrite> {
        self.pending.snapshot()
    }

    /// Clear a write after the backend confirmed this exact revision.
    pub fn acknowledge_write(&mut self, write: &PendingWrite) -> bool {
        self.pending.acknowledge(&write.id, write.revision)
    }

    // --- Focus view ---

    /// Animate to fit `id` in the visible area and force-load its full image.
    pub fn focus_entity(&mut self, id: EntityId, now_ms: f64) -> Vec<Action> {
        let Some(bounds) = self.effective_bounds(&id) else {
            return Vec::new();
        };
        let (width, height) = self.viewport.size();
        if bounds.width <= 0.0 || bounds.height <= 0.0 || width <= 0.0 || height <= 0.0 {
            return Vec::new();
        }
        let scale = clamp_scale((width * FOCUS_FILL / bounds.width).min(height * FOCUS_FILL / bounds.height));
        let target = Viewport::centered_on(bounds.center(), width, height, scale);
        if self.focus_return.is_none() {
            self.focus_return = Some(self.viewport.committed());
        }
        self.viewport.animate_to(target, now_ms, self.config.view_animation_ms);

        let mut actions = Vec::new();
        if let Some(cmd) = self.loader.load_immediately(id, &self.store) {
            actions.push(Action::Image(cmd));
        }
        actions.push(Action::RenderNeeded);
        actions
    }

    /// Animate back to the viewport saved by [`Engine::focus_entity`].
    pub fn exit_focus(&mut self, now_ms: f64) -> Vec<Action> {
        let Some(previous) = self.focus_return.take() else {
            return Vec::new();
        };
        self.viewport.animate_to(previous, now_ms, self.config.view_animation_ms);
        vec![Action::RenderNeeded]
    }

    #[must_use]
    pub fn is_focused(&self) -> bool {
        self.focus_return.is_some()
    }

    // --- Input events ---

    pub fn on_pointer_down(&mut self, screen_pt: Point, button: Button, modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        if self.selection.mode() == ToolMode::Hand {
            self.selection.begin_pan(screen_pt);
            return vec![Action::SetCursor("grabbing".into())];
        }
        let canvas_pt = self.viewport.to_canvas(screen_pt);
        match hit::entity_at(canvas_pt, &self.store) {
            Some(id) => match self.selection.press_entity(id, canvas_pt, modifiers.shift, &self.store) {
                EntityPress::Toggled => vec![Action::RenderNeeded],
                EntityPress::DragStarted => vec![Action::SetCursor("move".into()), Action::RenderNeeded],
                EntityPress::Ignored => Vec::new(),
            },
            None => {
                if self.selection.press_empty(canvas_pt, modifiers.shift) {
                    vec![Action::RenderNeeded]
                } else {
                    Vec::new()
                }
            }
        }
    }

    pub fn on_pointer_move(&mut self, screen_pt: Point, _modifiers: Modifiers) -> Vec<Action> {
        if self.selection.mode() == ToolMode::Hand {
            let Some(delta) = self.selection.pan_to(screen_pt) else {
                return Vec::new();
            };
            self.viewport.pan(delta);
            let mut actions = self.refresh_images();
            actions.push(Action::RenderNeeded);
            return actions;
        }
        let canvas_pt = self.viewport.to_canvas(screen_pt);
        if self.selection.track(canvas_pt) {
            vec![Action::RenderNeeded]
        } else {
            Vec::new()
        }
    }

    pub fn on_pointer_up(&mut self, screen_pt: Point, button: Button, _modifiers: Modifiers) -> Vec<Action> {
        if button != Button::Primary {
            return Vec::new();
        }
        let canvas_pt = self.viewport.to_canvas(screen_pt);
        match self.selection.state() {
            InteractionState::Hand { pan_anchor: Some(_) } => {
                self.selection.end_pan();
                vec![Action::SetCursor("grab".into()), Action::ViewportCommitted(self.viewport.committed())]
            }
            InteractionState::MoveMarquee(_) => {
                let scale = self.viewport.live().scale;
                self.selection.finish_marquee(canvas_pt, scale, &self.store);
                vec![Action::RenderNeeded]
            }
            InteractionState::MoveDragSingle(_) | InteractionState::MoveDragBatch(_) => {
                let mut actions = vec![Action::SetCursor("default".into())];
                if let Some(mut drag) = self.selection.finish_drag() {
                    drag.update(canvas_pt);
                    actions.extend(self.commit_drag(&drag));
                }
                actions.push(Action::RenderNeeded);
                actions
            }
            InteractionState::MoveIdle | InteractionState::Hand { pan_anchor: None } => Vec::new(),
        }
    }

    /// Wheel zoom. Writes the live transform only; [`Engine::tick`] commits it at idle.
    pub fn on_wheel(&mut self, screen_pt: Point, delta: WheelDelta, _modifiers: Modifiers, now_ms: f64) -> Vec<Action> {
        if !self.viewport.wheel(screen_pt, delta.dy, now_ms) {
            return Vec::new();
        }
        let mut actions = self.refresh_images();
        actions.push(Action::RenderNeeded);
        actions
    }

    pub fn on_key_down(&mut self, key: &Key, modifiers: Modifiers, now_ms: f64) -> Vec<Action> {
        if key.is_space() {
            let panning = matches!(self.selection.state(), InteractionState::Hand { pan_anchor: Some(_) });
            let mut actions = Vec::new();
            if let Some(drag) = self.selection.space_down() {
                actions.extend(self.commit_drag(&drag));
            }
            let cursor = if panning { "grabbing" } else { "grab" };
            actions.push(Action::SetCursor(cursor.into()));
            actions.push(Action::RenderNeeded);
            return actions;
        }
        if key.is_escape() {
            if self.is_focused() {
                return self.exit_focus(now_ms);
            }
            let mut actions = self.settle_drag();
            self.selection.clear();
            actions.push(Action::RenderNeeded);
            return actions;
        }
        if modifiers.command() && key.is_char('a') {
            let mut actions = self.settle_drag();
            self.selection.select_all(&self.store);
            actions.push(Action::RenderNeeded);
            return actions;
        }
        if modifiers.command() && key.is_char('z') {
            if modifiers.shift {
                return if self.history.can_redo() { vec![Action::RedoRequested] } else { Vec::new() };
            }
            return if self.history.can_undo() { vec![Action::UndoRequested] } else { Vec::new() };
        }
        if key.is_delete() && !self.selection.selection().is_empty() {
            let mut actions = self.settle_drag();
            if let Some(ids) = self.selection.take_for_delete() {
                actions.push(Action::DeleteRequested(ids));
            }
            actions.push(Action::RenderNeeded);
            return actions;
        }
        Vec::new()
    }

    pub fn on_key_up(&mut self, key: &Key, _modifiers: Modifiers) -> Vec<Action> {
        if key.is_space() && self.selection.mode() == ToolMode::Hand {
            self.selection.space_up();
            return vec![Action::SetCursor("default".into()), Action::RenderNeeded];
        }
        Vec::new()
    }

    /// Drop an in-progress drag where it currently is, before a keyboard
    /// command rewrites the selection it was built from.
    fn settle_drag(&mut self) -> Vec<Action> {
        let Some(drag) = self.selection.finish_drag() else {
            return Vec::new();
        };
        let mut actions = vec![Action::SetCursor("default".into())];
        actions.extend(self.commit_drag(&drag));
        actions
    }

    /// Write a finished drag into the store and pending map.
    fn commit_drag(&mut self, drag: &DragSession) -> Vec<Action> {
        let moved = drag.commit(&mut self.store, &mut self.pending);
        if moved.is_empty() {
            return Vec::new();
        }
        tracing::debug!(count = moved.len(), "drag committed");
        vec![Action::PositionsQueued(moved)]
    }

    // --- Image loading ---

    /// Recompute visibility against the live viewport and schedule loads.
    pub fn refresh_images(&mut self) -> Vec<Action> {
        let (width, height) = self.viewport.size();
        let live = self.viewport.live();
        self.loader.update(&live, width, height, &self.store).into_iter().map(Action::Image).collect()
    }

    pub fn on_image_loaded(&mut self, id: &EntityId, full: bool) -> Vec<Action> {
        let changed = if full { self.loader.on_full_loaded(id) } else { self.loader.on_thumbnail_loaded(id) };
        if changed { vec![Action::RenderNeeded] } else { Vec::new() }
    }

    pub fn on_image_failed(&mut self, id: &EntityId, full: bool) -> Vec<Action> {
        self.loader.on_load_failed(id, full);
        vec![Action::RenderNeeded]
    }

    // --- Frame ---

    /// Advance animations and the wheel idle timer, then refresh visibility.
    pub fn tick(&mut self, now_ms: f64) -> Vec<Action> {
        let tick = self.viewport.tick(now_ms);
        let mut actions = self.refresh_images();
        if tick.redraw {
            actions.push(Action::RenderNeeded);
        }
        if let Some(committed) = tick.committed {
            actions.push(Action::ViewportCommitted(committed));
        }
        actions
    }

    // --- Queries ---

    /// The committed (observable) viewport.
    #[must_use]
    pub fn camera(&self) -> Viewport {
        self.viewport.committed()
    }

    #[must_use]
    pub fn selected_ids(&self) -> Vec<EntityId> {
        self.selection.selection().to_vec()
    }

    #[must_use]
    pub fn entity(&self, id: &EntityId) -> Option<&Entity> {
        self.store.get(id)
    }

    /// Bounds of `id` as currently displayed: the live drag position wins over the stored one.
    #[must_use]
    pub fn effective_bounds(&self, id: &EntityId) -> Option<Rect> {
        let entity = self.store.get(id)?;
        let position = self
            .selection
            .state()
            .drag()
            .and_then(|drag| drag.position_of(id))
            .unwrap_or_else(|| entity.position());
        Some(Rect::new(position.x, position.y, entity.width, entity.height))
    }

    /// The active marquee in canvas space, normalized.
    #[must_use]
    pub fn marquee_rect(&self) -> Option<Rect> {
        self.selection.state().marquee().map(|m| m.rect())
    }

    /// Everything to draw, bottom to top.
    #[must_use]
    pub fn scene(&self) -> Vec<SceneItem> {
        self.store
            .ids()
            .into_iter()
            .filter_map(|id| {
                let bounds = self.effective_bounds(&id)?;
                Some(SceneItem { id, bounds, selected: self.selection.is_selected(&id), load: self.loader.state(&id) })
            })
            .collect()
    }
}
