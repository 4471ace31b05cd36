//! Backend stand-in used when no API URL is configured.

use canvas::entity::EntityId;
use canvas::geom::Point;
use canvas::viewport::Viewport;

use super::{ApiError, CanvasApi, ProjectId, ProjectSnapshot};

/// Accepts every write and stores nothing; every project opens empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineCanvasApi;

#[async_trait::async_trait]
impl CanvasApi for OfflineCanvasApi {
    async fn save_viewport(&self, _project: ProjectId, _viewport: Viewport) -> Result<(), ApiError> {
        Ok(())
    }

    async fn flush_position(&self, _entity: EntityId, _position: Point) -> Result<(), ApiError> {
        Ok(())
    }

    async fn delete_entity(&self, _entity: EntityId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn restore_entity(&self, _entity: EntityId) -> Result<(), ApiError> {
        Ok(())
    }

    async fn list_entities(&self, _project: ProjectId) -> Result<ProjectSnapshot, ApiError> {
        Ok(ProjectSnapshot::default())
    }
}
