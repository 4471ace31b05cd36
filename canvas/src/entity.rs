//! Entity model: placed images and the in-memory store of everything loaded
//! for the active project.
//!
//! Data flows into this layer from the persistence API (JSON deserialization)
//! and from the engine (drops, placements, undo restores). Draw order is
//! `(created_at, id)`: newer images sit on top.

#[cfg(test)]
#[path = "entity_test.rs"]
mod entity_test;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geom::{Point, Rect};

/// Unique identifier for a placed image.
pub type EntityId = Uuid;

/// A placed image as stored locally and on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Left edge in canvas space.
    pub x: f64,
    /// Top edge in canvas space.
    pub y: f64,
    /// Width in canvas units.
    pub width: f64,
    /// Height in canvas units.
    pub height: f64,
    /// Creation time in milliseconds since the Unix epoch.
    pub created_at: i64,
    /// Full-resolution image location.
    #[serde(default)]
    pub image_url: String,
    /// Reduced-size preview location, if the backend produced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Open-ended metadata (prompt, model, source, ...).
    #[serde(default)]
    pub props: serde_json::Value,
}

impl Entity {
    /// Bounding box at the stored position.
    #[must_use]
    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Prompt text from `props`, empty when absent.
    #[must_use]
    pub fn prompt(&self) -> &str {
        self.props
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or("")
    }
}

/// In-memory store of loaded entities.
pub struct EntityStore {
    entities: HashMap<EntityId, Entity>,
}

impl EntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self { entities: HashMap::new() }
    }

    /// Insert or replace an entity.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    /// Remove an entity, returning it if it was present.
    pub fn remove(&mut self, id: &EntityId) -> Option<Entity> {
        self.entities.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Move an entity. Returns false if it isn't loaded.
    pub fn set_position(&mut self, id: &EntityId, position: Point) -> bool {
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        entity.x = position.x;
        entity.y = position.y;
        true
    }

    /// Replace everything with a full snapshot.
    pub fn load_snapshot(&mut self, entities: Vec<Entity>) {
        self.entities.clear();
        for entity in entities {
            self.entities.insert(entity.id, entity);
        }
    }

    /// All entities in draw order (oldest first).
    #[must_use]
    pub fn sorted_entities(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// The most recently created entity.
    #[must_use]
    pub fn newest(&self) -> Option<&Entity> {
        self.entities
            .values()
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
    }

    /// Every loaded id, in draw order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.sorted_entities().into_iter().map(|e| e.id).collect()
    }

    /// Bounding boxes of every loaded entity.
    #[must_use]
    pub fn bounds(&self) -> Vec<Rect> {
        self.entities.values().map(Entity::bounds).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
