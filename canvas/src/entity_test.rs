#![allow(clippy::float_cmp)]

use serde_json::json;

use super::*;

fn make_entity(x: f64, y: f64, created_at: i64) -> Entity {
    Entity {
        id: Uuid::new_v4(),
        x,
        y,
        width: 100.0,
        height: 80.0,
        created_at,
        image_url: "https://cdn.test/full.png".into(),
        thumbnail_url: None,
        props: json!({}),
    }
}

// =============================================================
// Entity
// =============================================================

#[test]
fn bounds_matches_fields() {
    let e = make_entity(10.0, 20.0, 0);
    assert_eq!(e.bounds(), Rect::new(10.0, 20.0, 100.0, 80.0));
    assert_eq!(e.position(), Point::new(10.0, 20.0));
}

#[test]
fn prompt_defaults_to_empty() {
    let mut e = make_entity(0.0, 0.0, 0);
    assert_eq!(e.prompt(), "");
    e.props = json!({ "prompt": "a red fox" });
    assert_eq!(e.prompt(), "a red fox");
}

#[test]
fn deserializes_camel_case_wire_shape() {
    let id = Uuid::new_v4();
    let value = json!({
        "id": id,
        "x": 1.0,
        "y": 2.0,
        "width": 512.0,
        "height": 512.0,
        "createdAt": 1_700_000_000_000_i64,
        "imageUrl": "https://cdn.test/a.png",
        "thumbnailUrl": "https://cdn.test/a_thumb.png"
    });
    let e: Entity = serde_json::from_value(value).unwrap();
    assert_eq!(e.id, id);
    assert_eq!(e.created_at, 1_700_000_000_000);
    assert_eq!(e.thumbnail_url.as_deref(), Some("https://cdn.test/a_thumb.png"));
    assert!(e.props.is_null());
}

#[test]
fn missing_thumbnail_is_not_serialized() {
    let e = make_entity(0.0, 0.0, 0);
    let value = serde_json::to_value(&e).unwrap();
    assert!(value.get("thumbnailUrl").is_none());
    assert!(value.get("createdAt").is_some());
}

// =============================================================
// EntityStore
// =============================================================

#[test]
fn new_store_is_empty() {
    let store = EntityStore::new();
    assert!(store.is_empty());
    assert!(store.newest().is_none());
}

#[test]
fn insert_get_remove() {
    let mut store = EntityStore::new();
    let e = make_entity(0.0, 0.0, 1);
    let id = e.id;
    store.insert(e);
    assert!(store.contains(&id));
    assert_eq!(store.len(), 1);
    assert!(store.remove(&id).is_some());
    assert!(store.get(&id).is_none());
}

#[test]
fn set_position_moves_entity() {
    let mut store = EntityStore::new();
    let e = make_entity(0.0, 0.0, 1);
    let id = e.id;
    store.insert(e);
    assert!(store.set_position(&id, Point::new(40.0, -5.0)));
    assert_eq!(store.get(&id).map(Entity::position), Some(Point::new(40.0, -5.0)));
}

#[test]
fn set_position_missing_returns_false() {
    let mut store = EntityStore::new();
    assert!(!store.set_position(&Uuid::new_v4(), Point::new(1.0, 1.0)));
}

#[test]
fn load_snapshot_replaces_contents() {
    let mut store = EntityStore::new();
    store.insert(make_entity(0.0, 0.0, 1));
    store.load_snapshot(vec![make_entity(1.0, 1.0, 2), make_entity(2.0, 2.0, 3)]);
    assert_eq!(store.len(), 2);
}

#[test]
fn newest_uses_created_at() {
    let mut store = EntityStore::new();
    let old = make_entity(0.0, 0.0, 100);
    let new = make_entity(500.0, 500.0, 200);
    let new_id = new.id;
    store.insert(new);
    store.insert(old);
    assert_eq!(store.newest().map(|e| e.id), Some(new_id));
}

#[test]
fn sorted_entities_oldest_first() {
    let mut store = EntityStore::new();
    store.insert(make_entity(0.0, 0.0, 30));
    store.insert(make_entity(0.0, 0.0, 10));
    store.insert(make_entity(0.0, 0.0, 20));
    let order: Vec<i64> = store.sorted_entities().iter().map(|e| e.created_at).collect();
    assert_eq!(order, vec![10, 20, 30]);
    assert_eq!(store.ids().len(), 3);
}
