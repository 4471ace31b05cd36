//! Pending position map: dropped positions not yet confirmed by the backend.
//!
//! Writes are coalesced per entity (last write wins). Every write bumps a
//! revision so a flush that completes after a newer drop of the same entity
//! does not clear the newer value.

#[cfg(test)]
#[path = "pending_test.rs"]
mod pending_test;

use std::collections::HashMap;

use crate::entity::EntityId;
use crate::geom::Point;

/// One queued write, as handed to the flusher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingWrite {
    pub id: EntityId,
    pub position: Point,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingEntry {
    position: Point,
    revision: u64,
}

/// Dirty positions keyed by entity.
#[derive(Debug, Default)]
pub struct PendingPositions {
    entries: HashMap<EntityId, PendingEntry>,
    next_revision: u64,
}

impl PendingPositions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `position` for `id`, replacing any older unflushed value.
    pub fn record(&mut self, id: EntityId, position: Point) {
        self.next_revision += 1;
        self.entries.insert(id, PendingEntry { position, revision: self.next_revision });
    }

    /// Every queued write, ordered by revision (oldest first).
    #[must_use]
    pub fn snapshot(&self) -> Vec<PendingWrite> {
        let mut writes: Vec<PendingWrite> = self
            .entries
            .iter()
            .map(|(id, entry)| PendingWrite { id: *id, position: entry.position, revision: entry.revision })
            .collect();
        writes.sort_by_key(|w| w.revision);
        writes
    }

    /// Clear `id` after a confirmed flush of `revision`.
    ///
    /// Returns false and keeps the entry when a newer write has superseded it.
    pub fn acknowledge(&mut self, id: &EntityId, revision: u64) -> bool {
        let Some(entry) = self.entries.get(id) else {
            return false;
        };
        if entry.revision != revision {
            return false;
        }
        self.entries.remove(id);
        true
    }

    /// Drop any queued write for an entity that no longer exists.
    pub fn discard(&mut self, id: &EntityId) {
        self.entries.remove(id);
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<Point> {
        self.entries.get(id).map(|e| e.position)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
