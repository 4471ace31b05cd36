//! REST client for the persistence backend.
//!
//! Thin reqwest wrapper. Route construction and response parsing are pure
//! functions so they can be tested without a server.

use canvas::entity::EntityId;
use canvas::geom::Point;
use canvas::viewport::Viewport;
use reqwest::Method;

use super::{ApiError, CanvasApi, ProjectId, ProjectSnapshot};
use crate::config::HttpTimeouts;

// =============================================================================
// CLIENT
// =============================================================================

pub struct HttpCanvasApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpCanvasApi {
    /// Build a client rooted at `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::HttpClientBuild`] if reqwest cannot build a client.
    pub fn new(base_url: String, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request())
            .connect_timeout(timeouts.connect())
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, method: Method, path: &str, body: Option<serde_json::Value>) -> Result<String, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.request(method.clone(), url.as_str());
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(map_send_error)?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;

        tracing::debug!(%method, path, status, "api call");
        check_status(status, text)
    }
}

#[async_trait::async_trait]
impl CanvasApi for HttpCanvasApi {
    async fn save_viewport(&self, project: ProjectId, viewport: Viewport) -> Result<(), ApiError> {
        let body = serde_json::to_value(viewport).map_err(|e| ApiError::Parse(e.to_string()))?;
        self.send(Method::PUT, &viewport_path(project), Some(body)).await?;
        Ok(())
    }

    async fn flush_position(&self, entity: EntityId, position: Point) -> Result<(), ApiError> {
        let body = serde_json::json!({ "x": position.x, "y": position.y });
        self.send(Method::PUT, &position_path(entity), Some(body)).await?;
        Ok(())
    }

    async fn delete_entity(&self, entity: EntityId) -> Result<(), ApiError> {
        self.send(Method::DELETE, &entity_path(entity), None).await?;
        Ok(())
    }

    async fn restore_entity(&self, entity: EntityId) -> Result<(), ApiError> {
        self.send(Method::POST, &restore_path(entity), None).await?;
        Ok(())
    }

    async fn list_entities(&self, project: ProjectId) -> Result<ProjectSnapshot, ApiError> {
        let text = self.send(Method::GET, &entities_path(project), None).await?;
        parse_snapshot(&text)
    }
}

// =============================================================================
// ROUTES
// =============================================================================

fn viewport_path(project: ProjectId) -> String {
    format!("/projects/{project}/viewport")
}

fn entities_path(project: ProjectId) -> String {
    format!("/projects/{project}/entities")
}

fn entity_path(entity: EntityId) -> String {
    format!("/entities/{entity}")
}

fn position_path(entity: EntityId) -> String {
    format!("/entities/{entity}/position")
}

fn restore_path(entity: EntityId) -> String {
    format!("/entities/{entity}/restore")
}

// =============================================================================
// PARSING
// =============================================================================

fn map_send_error(err: reqwest::Error) -> ApiError {
    if err.is_connect() {
        ApiError::Disconnected(err.to_string())
    } else {
        ApiError::Request(err.to_string())
    }
}

fn check_status(status: u16, body: String) -> Result<String, ApiError> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(ApiError::Status { status, body })
    }
}

fn parse_snapshot(json: &str) -> Result<ProjectSnapshot, ApiError> {
    serde_json::from_str(json).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
