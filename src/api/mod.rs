//! Persistence API: the backend seam the session talks to.
//!
//! DESIGN
//! ======
//! [`CanvasApi`] is transport-neutral so the session can be driven by the
//! REST client in production, by [`OfflineCanvasApi`] when no backend is
//! configured, and by in-test fakes. Every write is idempotent per entity:
//! repeating a position flush or a delete is harmless, which is what lets
//! the session retry failed flushes on the next cycle.

pub mod http;
pub mod offline;

use canvas::entity::{Entity, EntityId};
use canvas::geom::Point;
use canvas::viewport::Viewport;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpCanvasApi;
pub use offline::OfflineCanvasApi;

/// Unique identifier for a project (one canvas).
pub type ProjectId = Uuid;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by persistence API calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The backend could not be reached at all.
    #[error("backend unreachable: {0}")]
    Disconnected(String),

    /// The request failed after a connection was made.
    #[error("API request failed: {0}")]
    Request(String),

    /// The backend returned a non-success HTTP status.
    #[error("API response error: status {status}")]
    Status { status: u16, body: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ApiError {
    /// Whether repeating the same call later could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Disconnected(_) | Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

/// Everything needed to open a project: its entities and the saved view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,
}

// =============================================================================
// API TRAIT
// =============================================================================

/// Backend operations used by the canvas session. Enables mocking in tests.
#[async_trait::async_trait]
pub trait CanvasApi: Send + Sync {
    /// Persist the committed viewport for a project.
    async fn save_viewport(&self, project: ProjectId, viewport: Viewport) -> Result<(), ApiError>;

    /// Persist one entity position. Last write wins.
    async fn flush_position(&self, entity: EntityId, position: Point) -> Result<(), ApiError>;

    /// Soft-delete (trash) an entity.
    async fn delete_entity(&self, entity: EntityId) -> Result<(), ApiError>;

    /// Reverse a soft delete.
    async fn restore_entity(&self, entity: EntityId) -> Result<(), ApiError>;

    /// Load a project's live entities and saved viewport.
    async fn list_entities(&self, project: ProjectId) -> Result<ProjectSnapshot, ApiError>;
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
