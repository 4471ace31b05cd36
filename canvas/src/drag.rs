//! Batch drag: delta-based repositioning of every selected entity.
//!
//! A drag snapshots the start position of each dragged entity and the
//! pointer's canvas position. Each move recomputes a single delta from the
//! pointer and applies it to every snapshot, so pairwise offsets between
//! dragged entities never drift. The store is untouched until drop; while the
//! drag is live, [`DragSession::position_of`] overrides stored positions.

#[cfg(test)]
#[path = "drag_test.rs"]
mod drag_test;

use std::collections::BTreeMap;

use crate::entity::{EntityId, EntityStore};
use crate::geom::Point;
use crate::pending::PendingPositions;

/// Gesture context for an in-progress drag.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    /// The entity under the pointer at drag start.
    grabbed: EntityId,
    /// Canvas-space pointer position at drag start.
    start_pointer: Point,
    /// Pointer minus grabbed entity origin, in canvas space.
    grab_offset: Point,
    /// Start positions of every dragged entity.
    origins: BTreeMap<EntityId, Point>,
    /// Current pointer delta from `start_pointer`.
    delta: Point,
}

impl DragSession {
    /// Snapshot `ids` (plus `grabbed`) from the store and start tracking the pointer.
    ///
    /// Ids that aren't loaded are skipped. Returns `None` if `grabbed` isn't loaded.
    #[must_use]
    pub fn begin<I>(grabbed: EntityId, pointer: Point, ids: I, store: &EntityStore) -> Option<Self>
    where
        I: IntoIterator<Item = EntityId>,
    {
        let grabbed_entity = store.get(&grabbed)?;
        let grab_offset = pointer.sub(grabbed_entity.position());
        let mut origins = BTreeMap::new();
        origins.insert(grabbed, grabbed_entity.position());
        for id in ids {
            if let Some(entity) = store.get(&id) {
                origins.insert(id, entity.position());
            }
        }
        Some(Self { grabbed, start_pointer: pointer, grab_offset, origins, delta: Point::default() })
    }

    /// Track the pointer. O(1); positions are derived on read.
    pub fn update(&mut self, pointer: Point) {
        self.delta = pointer.sub(self.start_pointer);
    }

    #[must_use]
    pub fn grabbed(&self) -> EntityId {
        self.grabbed
    }

    #[must_use]
    pub fn grab_offset(&self) -> Point {
        self.grab_offset
    }

    #[must_use]
    pub fn delta(&self) -> Point {
        self.delta
    }

    #[must_use]
    pub fn has_moved(&self) -> bool {
        !self.delta.is_zero()
    }

    /// More than one entity is being dragged.
    #[must_use]
    pub fn is_batch(&self) -> bool {
        self.origins.len() > 1
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.origins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.origins.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.origins.contains_key(id)
    }

    #[must_use]
    pub fn origin_of(&self, id: &EntityId) -> Option<Point> {
        self.origins.get(id).copied()
    }

    /// Transient position of a dragged entity: snapshot + delta.
    #[must_use]
    pub fn position_of(&self, id: &EntityId) -> Option<Point> {
        self.origins.get(id).map(|origin| origin.add(self.delta))
    }

    /// Transient positions of every dragged entity, in id order.
    #[must_use]
    pub fn positions(&self) -> Vec<(EntityId, Point)> {
        self.origins
            .iter()
            .map(|(id, origin)| (*id, origin.add(self.delta)))
            .collect()
    }

    /// Stop tracking an entity that was removed mid-drag.
    pub fn forget(&mut self, id: &EntityId) {
        self.origins.remove(id);
    }

    /// Write the dropped positions into the store and queue them for flush.
    ///
    /// A zero-delta drop is a plain click and changes nothing. Returns the ids
    /// that moved.
    pub fn commit(&self, store: &mut EntityStore, pending: &mut PendingPositions) -> Vec<EntityId> {
        if !self.has_moved() {
            return Vec::new();
        }
        let mut moved = Vec::with_capacity(self.origins.len());
        for (id, position) in self.positions() {
            if store.set_position(&id, position) {
                pending.record(id, position);
                moved.push(id);
            }
        }
        moved
    }
}
