//! Tool mode, selection set and the gesture state machine.
//!
//! Tool mode and the active gesture are one tagged enum
//! ([`InteractionState`]) so impossible combinations (a marquee while
//! dragging, a drag while in hand mode) cannot be represented. The
//! [`SelectionEngine`] owns that state plus the [`SelectionSet`] and applies
//! the transition table; the engine feeds it hit-test results and pointer
//! positions.
//!
//! | From | Event | To |
//! |------|-------|----|
//! | any | Space down | `Hand` |
//! | `Hand` | Space up | `MoveIdle` |
//! | `Hand` | pointer down | `Hand` (panning) |
//! | `MoveIdle` | down on empty canvas | `MoveMarquee` |
//! | `MoveIdle` | down on entity | `MoveDragSingle` / `MoveDragBatch` |
//! | `MoveIdle` | Shift + down on entity | `MoveIdle` (toggle) |
//! | `MoveMarquee` / `MoveDrag*` | pointer up | `MoveIdle` |

#[cfg(test)]
#[path = "selection_test.rs"]
mod selection_test;

use std::collections::BTreeSet;

use crate::consts::MARQUEE_MIN_AREA_PX;
use crate::drag::DragSession;
use crate::entity::{EntityId, EntityStore};
use crate::geom::{Point, Rect};
use crate::hit;

/// Ordered set of selected entity ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<EntityId>,
}

impl SelectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.ids.contains(id)
    }

    pub fn insert(&mut self, id: EntityId) -> bool {
        self.ids.insert(id)
    }

    pub fn remove(&mut self, id: &EntityId) -> bool {
        self.ids.remove(id)
    }

    /// Flip membership of `id`. Applying it twice restores the original set.
    pub fn toggle(&mut self, id: EntityId) {
        if !self.ids.remove(&id) {
            self.ids.insert(id);
        }
    }

    /// Replace the whole set.
    pub fn replace<I>(&mut self, ids: I)
    where
        I: IntoIterator<Item = EntityId>,
    {
        self.ids = ids.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids that no longer reference a loaded entity.
    pub fn prune(&mut self, store: &EntityStore) {
        self.ids.retain(|id| store.contains(id));
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.ids.iter()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<EntityId> {
        self.ids.iter().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Which tool the pointer currently acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    /// Select, marquee and drag entities.
    Move,
    /// Pan the viewport (Space held).
    Hand,
}

/// Marquee gesture in canvas space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Marquee {
    pub start: Point,
    pub end: Point,
}

impl Marquee {
    /// Normalized min-corner + extents rectangle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.start, self.end)
    }
}

/// Tool mode and active gesture as a single state.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum InteractionState {
    /// Move tool, no gesture in progress.
    #[default]
    MoveIdle,
    /// Drag-selecting with a rectangle.
    MoveMarquee(Marquee),
    /// Dragging exactly one entity.
    MoveDragSingle(DragSession),
    /// Dragging the whole multi-entity selection.
    MoveDragBatch(DragSession),
    /// Hand tool. `pan_anchor` is the last screen point while the pointer is down.
    Hand { pan_anchor: Option<Point> },
}

impl InteractionState {
    #[must_use]
    pub fn mode(&self) -> ToolMode {
        match self {
            Self::Hand { .. } => ToolMode::Hand,
            _ => ToolMode::Move,
        }
    }

    /// The drag session, if one is active.
    #[must_use]
    pub fn drag(&self) -> Option<&DragSession> {
        match self {
            Self::MoveDragSingle(drag) | Self::MoveDragBatch(drag) => Some(drag),
            _ => None,
        }
    }

    #[must_use]
    pub fn marquee(&self) -> Option<&Marquee> {
        match self {
            Self::MoveMarquee(marquee) => Some(marquee),
            _ => None,
        }
    }
}

/// Outcome of a pointer-down on an entity in move mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityPress {
    /// Shift-click flipped membership; no drag started.
    Toggled,
    /// A drag of one or more entities started.
    DragStarted,
    /// The entity vanished between hit-test and press.
    Ignored,
}

/// Selection set plus interaction state, driven by the transition table.
#[derive(Debug, Clone, Default)]
pub struct SelectionEngine {
    state: InteractionState,
    selection: SelectionSet,
}

impl SelectionEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // --- Queries ---

    #[must_use]
    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    #[must_use]
    pub fn mode(&self) -> ToolMode {
        self.state.mode()
    }

    #[must_use]
    pub fn is_selected(&self, id: &EntityId) -> bool {
        self.selection.contains(id)
    }

    // --- Tool mode ---

    /// Enter hand mode from any state.
    ///
    /// An in-progress drag is handed back so the caller can commit it; an
    /// in-progress marquee is abandoned.
    pub fn space_down(&mut self) -> Option<DragSession> {
        let previous = std::mem::replace(&mut self.state, InteractionState::Hand { pan_anchor: None });
        match previous {
            InteractionState::MoveDragSingle(drag) | InteractionState::MoveDragBatch(drag) => Some(drag),
            InteractionState::Hand { pan_anchor } => {
                self.state = InteractionState::Hand { pan_anchor };
                None
            }
            _ => None,
        }
    }

    /// Leave hand mode. No-op in any other state.
    pub fn space_up(&mut self) {
        if matches!(self.state, InteractionState::Hand { .. }) {
            self.state = InteractionState::MoveIdle;
        }
    }

    // --- Pointer ---

    /// Pointer down in hand mode: start panning from `screen`.
    pub fn begin_pan(&mut self, screen: Point) -> bool {
        if let InteractionState::Hand { pan_anchor } = &mut self.state {
            *pan_anchor = Some(screen);
            return true;
        }
        false
    }

    /// Pointer move in hand mode: returns the screen delta since the last anchor.
    pub fn pan_to(&mut self, screen: Point) -> Option<Point> {
        if let InteractionState::Hand { pan_anchor: Some(anchor) } = &mut self.state {
            let delta = screen.sub(*anchor);
            *anchor = screen;
            return Some(delta);
        }
        None
    }

    /// Pointer up in hand mode.
    pub fn end_pan(&mut self) {
        if let InteractionState::Hand { pan_anchor } = &mut self.state {
            *pan_anchor = None;
        }
    }

    /// Pointer down on empty canvas in move mode: start a marquee at `canvas`.
    ///
    /// The selection is cleared unless Shift is held.
    pub fn press_empty(&mut self, canvas: Point, shift: bool) -> bool {
        if self.state != InteractionState::MoveIdle {
            return false;
        }
        if !shift {
            self.selection.clear();
        }
        self.state = InteractionState::MoveMarquee(Marquee { start: canvas, end: canvas });
        true
    }

    /// Pointer down on `id` in move mode.
    ///
    /// Shift toggles membership. Without Shift an unselected entity replaces
    /// the selection, and the drag covers the whole (possibly new) selection.
    pub fn press_entity(&mut self, id: EntityId, canvas: Point, shift: bool, store: &EntityStore) -> EntityPress {
        if self.state != InteractionState::MoveIdle || !store.contains(&id) {
            return EntityPress::Ignored;
        }
        if shift {
            self.selection.toggle(id);
            return EntityPress::Toggled;
        }
        if !self.selection.contains(&id) {
            self.selection.replace([id]);
        }
        let Some(drag) = DragSession::begin(id, canvas, self.selection.to_vec(), store) else {
            return EntityPress::Ignored;
        };
        self.state = if drag.is_batch() {
            InteractionState::MoveDragBatch(drag)
        } else {
            InteractionState::MoveDragSingle(drag)
        };
        EntityPress::DragStarted
    }

    /// Pointer move in move mode: stretch the marquee or advance the drag.
    ///
    /// Returns true when something visible changed.
    pub fn track(&mut self, canvas: Point) -> bool {
        match &mut self.state {
            InteractionState::MoveMarquee(marquee) => {
                marquee.end = canvas;
                true
            }
            InteractionState::MoveDragSingle(drag) | InteractionState::MoveDragBatch(drag) => {
                drag.update(canvas);
                true
            }
            _ => false,
        }
    }

    /// Finish a marquee at `canvas`.
    ///
    /// When the rectangle's screen-space area (at `scale`) exceeds 5×5 px the
    /// selection is replaced by the intersecting ids, otherwise nothing
    /// changes. Returns true if the selection was replaced.
    pub fn finish_marquee(&mut self, canvas: Point, scale: f64, store: &EntityStore) -> bool {
        let InteractionState::MoveMarquee(mut marquee) = self.state else {
            return false;
        };
        self.state = InteractionState::MoveIdle;
        marquee.end = canvas;
        let rect = marquee.rect();
        if rect.area() * scale * scale <= MARQUEE_MIN_AREA_PX {
            return false;
        }
        self.selection.replace(hit::marquee_hits(&rect, store));
        true
    }

    /// Finish a drag, handing the session back for commit.
    pub fn finish_drag(&mut self) -> Option<DragSession> {
        match std::mem::take(&mut self.state) {
            InteractionState::MoveDragSingle(drag) | InteractionState::MoveDragBatch(drag) => Some(drag),
            other => {
                self.state = other;
                None
            }
        }
    }

    // --- Selection commands ---

    /// Shift-click semantics without a pointer.
    pub fn toggle(&mut self, id: EntityId) {
        self.selection.toggle(id);
    }

    pub fn clear(&mut self) {
        self.selection.clear();
    }

    /// Select every loaded entity.
    pub fn select_all(&mut self, store: &EntityStore) {
        self.selection.replace(store.ids());
    }

    /// Put still-loaded ids back into the selection.
    pub fn reselect<I>(&mut self, ids: I, store: &EntityStore)
    where
        I: IntoIterator<Item = EntityId>,
    {
        for id in ids {
            if store.contains(&id) {
                self.selection.insert(id);
            }
        }
    }

    /// Take the selection as a batch-delete intent, clearing it.
    ///
    /// Returns `None` when nothing is selected.
    pub fn take_for_delete(&mut self) -> Option<Vec<EntityId>> {
        if self.selection.is_empty() {
            return None;
        }
        let ids = self.selection.to_vec();
        self.selection.clear();
        Some(ids)
    }

    /// Restore the selection invariant after the loaded set changed.
    ///
    /// Removed entities leave the selection and any live drag.
    pub fn prune(&mut self, store: &EntityStore) {
        self.selection.prune(store);
        if let InteractionState::MoveDragSingle(drag) | InteractionState::MoveDragBatch(drag) = &mut self.state {
            let gone: Vec<EntityId> = drag
                .positions()
                .into_iter()
                .map(|(id, _)| id)
                .filter(|id| !store.contains(id))
                .collect();
            for id in &gone {
                drag.forget(id);
            }
            if drag.is_empty() || !store.contains(&drag.grabbed()) {
                self.state = InteractionState::MoveIdle;
            }
        }
    }

    /// Back to `MoveIdle` with an empty selection (project switch).
    pub fn reset(&mut self) {
        self.state = InteractionState::MoveIdle;
        self.selection.clear();
    }
}
