//! Bounded undo history for destructive operations.
//!
//! Only deletes are recorded, and only after the backend confirms them.
//! The contract is two explicit stacks rather than a generic command
//! pattern:
//!
//! - undo pops the newest record; the session restores each member
//!   independently and the record is consumed whether or not every restore
//!   succeeded. Restored members move to the redo stack.
//! - redo is **not** the inverse of undo: it re-issues a delete for the same
//!   ids, and the members the backend confirms become a fresh undo record.
//!
//! Because restores and deletes are asynchronous, each step is split into
//! `begin_*` / `finish_*`. While a step is in flight the history is
//! processing and further `begin_*` calls are ignored.

#[cfg(test)]
#[path = "history_test.rs"]
mod history_test;

use std::collections::VecDeque;

use crate::consts::UNDO_CAPACITY;
use crate::entity::{Entity, EntityId};
use crate::geom::Point;

/// One deleted entity: enough state to redisplay it without a re-fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRecord {
    pub entity_id: EntityId,
    pub snapshot: Entity,
    pub position: Point,
}

impl DeleteRecord {
    #[must_use]
    pub fn from_entity(entity: Entity) -> Self {
        Self { entity_id: entity.id, position: entity.position(), snapshot: entity }
    }
}

/// A reversible destructive operation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoRecord {
    Delete(DeleteRecord),
    BatchDelete(Vec<DeleteRecord>),
}

impl UndoRecord {
    /// Wrap confirmed deletes: one member → `Delete`, several → `BatchDelete`, none → `None`.
    #[must_use]
    pub fn from_deleted(mut members: Vec<DeleteRecord>) -> Option<Self> {
        match members.len() {
            0 => None,
            1 => members.pop().map(Self::Delete),
            _ => Some(Self::BatchDelete(members)),
        }
    }

    #[must_use]
    pub fn members(&self) -> &[DeleteRecord] {
        match self {
            Self::Delete(record) => std::slice::from_ref(record),
            Self::BatchDelete(records) => records,
        }
    }

    #[must_use]
    pub fn entity_ids(&self) -> Vec<EntityId> {
        self.members().iter().map(|m| m.entity_id).collect()
    }

    /// Keep only members whose id is in `ids`, re-wrapping the result.
    #[must_use]
    pub fn retain_ids(&self, ids: &[EntityId]) -> Option<Self> {
        let kept = self
            .members()
            .iter()
            .filter(|m| ids.contains(&m.entity_id))
            .cloned()
            .collect();
        Self::from_deleted(kept)
    }
}

/// Bounded LIFO of delete records plus the redo stack.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    undo: VecDeque<UndoRecord>,
    redo: Vec<UndoRecord>,
    capacity: usize,
    processing: bool,
}

impl Default for UndoHistory {
    fn default() -> Self {
        Self::new(UNDO_CAPACITY)
    }
}

impl UndoHistory {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { undo: VecDeque::new(), redo: Vec::new(), capacity: capacity.max(1), processing: false }
    }

    // --- Queries ---

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    #[must_use]
    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.processing && !self.undo.is_empty()
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.processing && !self.redo.is_empty()
    }

    #[must_use]
    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// The record the next undo would pop.
    #[must_use]
    pub fn peek_undo(&self) -> Option<&UndoRecord> {
        self.undo.back()
    }

    // --- Push / pop ---

    /// Record a confirmed user delete. Clears the redo stack.
    pub fn push_delete(&mut self, record: UndoRecord) {
        self.redo.clear();
        self.push_undo(record);
    }

    /// Pop the newest undo record and mark the history processing.
    ///
    /// Returns `None` when empty or while another step is in flight.
    pub fn begin_undo(&mut self) -> Option<UndoRecord> {
        if self.processing {
            tracing::debug!("undo ignored: history step already in flight");
            return None;
        }
        let record = self.undo.pop_back()?;
        self.processing = true;
        Some(record)
    }

    /// Finish an undo step. `restored` is the subset the backend restored.
    pub fn finish_undo(&mut self, restored: Option<UndoRecord>) {
        if let Some(record) = restored {
            self.redo.push(record);
        }
        self.processing = false;
    }

    /// Pop the newest redo record and mark the history processing.
    pub fn begin_redo(&mut self) -> Option<UndoRecord> {
        if self.processing {
            tracing::debug!("redo ignored: history step already in flight");
            return None;
        }
        let record = self.redo.pop()?;
        self.processing = true;
        Some(record)
    }

    /// Finish a redo step. `deleted` is the subset the backend deleted again;
    /// it becomes a new undo record without clearing the remaining redo stack.
    pub fn finish_redo(&mut self, deleted: Option<UndoRecord>) {
        if let Some(record) = deleted {
            self.push_undo(record);
        }
        self.processing = false;
    }

    /// Drop everything (project switch).
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.processing = false;
    }

    fn push_undo(&mut self, record: UndoRecord) {
        self.undo.push_back(record);
        while self.undo.len() > self.capacity {
            self.undo.pop_front();
            tracing::debug!(capacity = self.capacity, "undo history full; dropped oldest record");
        }
    }
}
