//! Hit-testing against entity bounding boxes.
//!
//! All tests are axis-aligned and run in canvas space. Any non-zero overlap
//! area counts for a marquee; there is no minimum coverage threshold.

#[cfg(test)]
#[path = "hit_test.rs"]
mod hit_test;

use crate::entity::{EntityId, EntityStore};
use crate::geom::{Point, Rect};

/// AABB overlap with non-zero area.
#[must_use]
pub fn aabb_overlap(a: &Rect, b: &Rect) -> bool {
    a.intersects(b)
}

/// Ids of every entity whose box overlaps `marquee`, in draw order.
#[must_use]
pub fn marquee_hits(marquee: &Rect, store: &EntityStore) -> Vec<EntityId> {
    store
        .sorted_entities()
        .into_iter()
        .filter(|e| aabb_overlap(marquee, &e.bounds()))
        .map(|e| e.id)
        .collect()
}

/// The top-most entity containing `canvas_pt`, if any.
#[must_use]
pub fn entity_at(canvas_pt: Point, store: &EntityStore) -> Option<EntityId> {
    store
        .sorted_entities()
        .into_iter()
        .rev()
        .find(|e| e.bounds().contains(canvas_pt))
        .map(|e| e.id)
}
