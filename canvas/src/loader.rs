//! Progressive image loading driven by viewport visibility.
//!
//! Every loaded entity moves through
//! `Placeholder → Thumbnail → LoadingFull → Loaded`. The loader never fetches
//! anything itself: [`ImageLoader::update`] compares the current visible set
//! against the per-entity state and returns [`LoadCommand`]s for the host to
//! execute, which then reports back through the `on_*` callbacks.
//!
//! An entity is visible when its screen-space box intersects the screen
//! rectangle inflated by the prefetch margin. Leaving visibility cancels an
//! in-flight full fetch unless the entity was force-loaded.
//!
//! One loader exists per open project; the engine replaces it on switch.

#[cfg(test)]
#[path = "loader_test.rs"]
mod loader_test;

use std::collections::{BTreeSet, HashMap};

use crate::consts::PREFETCH_MARGIN_PX;
use crate::entity::{EntityId, EntityStore};
use crate::geom::Rect;
use crate::viewport::Viewport;

/// Display quality currently available for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Placeholder,
    Thumbnail,
    LoadingFull,
    Loaded,
}

/// Work for the host's image pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadCommand {
    FetchThumbnail { id: EntityId, url: String },
    FetchFull { id: EntityId, url: String },
    CancelFull { id: EntityId },
}

impl LoadCommand {
    #[must_use]
    pub fn id(&self) -> EntityId {
        match self {
            Self::FetchThumbnail { id, .. } | Self::FetchFull { id, .. } | Self::CancelFull { id } => *id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    state: LoadState,
    has_thumbnail: bool,
    thumbnail_in_flight: bool,
    failed: bool,
    pinned: bool,
}

impl Slot {
    /// Where a cancelled or failed full fetch falls back to.
    fn below_full(self) -> LoadState {
        if self.has_thumbnail { LoadState::Thumbnail } else { LoadState::Placeholder }
    }
}

/// Per-project visibility tracker and load scheduler.
#[derive(Debug, Clone)]
pub struct ImageLoader {
    slots: HashMap<EntityId, Slot>,
    visible: BTreeSet<EntityId>,
    margin: f64,
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new(PREFETCH_MARGIN_PX)
    }
}

impl ImageLoader {
    #[must_use]
    pub fn new(margin: f64) -> Self {
        Self { slots: HashMap::new(), visible: BTreeSet::new(), margin: margin.max(0.0) }
    }

    // --- Queries ---

    #[must_use]
    pub fn state(&self, id: &EntityId) -> LoadState {
        self.slots.get(id).map(|s| s.state).unwrap_or_default()
    }

    #[must_use]
    pub fn is_visible(&self, id: &EntityId) -> bool {
        self.visible.contains(id)
    }

    #[must_use]
    pub fn visible_ids(&self) -> Vec<EntityId> {
        self.visible.iter().copied().collect()
    }

    #[must_use]
    pub fn margin(&self) -> f64 {
        self.margin
    }

    // --- Scheduling ---

    /// Recompute visibility for a `width` × `height` screen and schedule loads.
    pub fn update(&mut self, viewport: &Viewport, width: f64, height: f64, store: &EntityStore) -> Vec<LoadCommand> {
        let mut commands = Vec::new();

        // Entities that left the store.
        let gone: Vec<EntityId> = self.slots.keys().filter(|id| !store.contains(id)).copied().collect();
        for id in gone {
            commands.extend(self.forget(&id));
        }

        let screen = Rect::new(0.0, 0.0, width, height).inflate(self.margin);
        let mut visible = BTreeSet::new();

        for entity in store.sorted_entities() {
            let id = entity.id;
            let on_screen = viewport.rect_to_screen(&entity.bounds()).intersects(&screen);
            let entered = on_screen && !self.visible.contains(&id);
            let slot = self.slots.entry(id).or_default();

            if !on_screen {
                if slot.state == LoadState::LoadingFull && !slot.pinned {
                    slot.state = slot.below_full();
                    commands.push(LoadCommand::CancelFull { id });
                }
                continue;
            }

            visible.insert(id);
            if entered {
                slot.failed = false;
            }
            if slot.failed {
                continue;
            }
            match slot.state {
                LoadState::Placeholder if !slot.thumbnail_in_flight => match &entity.thumbnail_url {
                    Some(url) => {
                        slot.thumbnail_in_flight = true;
                        commands.push(LoadCommand::FetchThumbnail { id, url: url.clone() });
                    }
                    None => {
                        slot.state = LoadState::LoadingFull;
                        commands.push(LoadCommand::FetchFull { id, url: entity.image_url.clone() });
                    }
                },
                LoadState::Thumbnail => {
                    slot.state = LoadState::LoadingFull;
                    commands.push(LoadCommand::FetchFull { id, url: entity.image_url.clone() });
                }
                LoadState::Placeholder | LoadState::LoadingFull | LoadState::Loaded => {}
            }
        }

        self.visible = visible;
        if !commands.is_empty() {
            tracing::debug!(count = commands.len(), visible = self.visible.len(), "image loader scheduled work");
        }
        commands
    }

    /// Request full resolution now, regardless of visibility, and pin it.
    pub fn load_immediately(&mut self, id: EntityId, store: &EntityStore) -> Option<LoadCommand> {
        let entity = store.get(&id)?;
        let slot = self.slots.entry(id).or_default();
        slot.failed = false;
        match slot.state {
            LoadState::Loaded => None,
            LoadState::LoadingFull => {
                slot.pinned = true;
                None
            }
            LoadState::Placeholder | LoadState::Thumbnail => {
                slot.pinned = true;
                slot.state = LoadState::LoadingFull;
                Some(LoadCommand::FetchFull { id, url: entity.image_url.clone() })
            }
        }
    }

    // --- Completion callbacks ---

    /// A thumbnail arrived. Returns true when the display state changed.
    pub fn on_thumbnail_loaded(&mut self, id: &EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        slot.thumbnail_in_flight = false;
        slot.has_thumbnail = true;
        if slot.state == LoadState::Placeholder {
            slot.state = LoadState::Thumbnail;
            return true;
        }
        false
    }

    /// A full-resolution image arrived. Late results for cancelled fetches are ignored.
    pub fn on_full_loaded(&mut self, id: &EntityId) -> bool {
        let Some(slot) = self.slots.get_mut(id) else {
            return false;
        };
        if slot.state != LoadState::LoadingFull {
            tracing::debug!(%id, state = ?slot.state, "ignoring stale full-resolution result");
            return false;
        }
        slot.state = LoadState::Loaded;
        slot.pinned = false;
        true
    }

    /// A fetch failed. The entity falls back one state and is not retried
    /// until it re-enters visibility or is force-loaded.
    pub fn on_load_failed(&mut self, id: &EntityId, full: bool) {
        let Some(slot) = self.slots.get_mut(id) else {
            return;
        };
        slot.failed = true;
        if full {
            if slot.state == LoadState::LoadingFull {
                slot.state = slot.below_full();
                slot.pinned = false;
            }
        } else {
            slot.thumbnail_in_flight = false;
        }
        tracing::debug!(%id, full, "image load failed");
    }

    /// Drop all state for an entity, cancelling any in-flight full fetch.
    pub fn forget(&mut self, id: &EntityId) -> Option<LoadCommand> {
        self.visible.remove(id);
        let slot = self.slots.remove(id)?;
        (slot.state == LoadState::LoadingFull).then_some(LoadCommand::CancelFull { id: *id })
    }

    /// Drop everything, returning cancels for in-flight full fetches.
    pub fn reset(&mut self) -> Vec<LoadCommand> {
        let mut in_flight: Vec<EntityId> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.state == LoadState::LoadingFull)
            .map(|(id, _)| *id)
            .collect();
        in_flight.sort();
        self.slots.clear();
        self.visible.clear();
        in_flight.into_iter().map(|id| LoadCommand::CancelFull { id }).collect()
    }
}
