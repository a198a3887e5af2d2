//! Read-only HTTP API over a mirrored collection.

use axum::{extract::State, http::StatusCode, response::Json, routing::get, Router};
use livesync::SubscriptionView;
use livesync_types::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatusResponse {
    pub kind: String,
    pub state: String,
    pub entity_count: usize,
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub fetch_count: u64,
    /// Unix millis of the last successful fetch.
    pub last_fetched_at: Option<u64>,
}

impl StatusResponse {
    pub fn from_view<E: Entity>(kind: &str, view: &SubscriptionView<E>) -> Self {
        Self {
            kind: kind.to_string(),
            state: view.state.to_string(),
            entity_count: view.entity_count(),
            is_loading: view.is_loading,
            last_error: view.last_error.as_ref().map(ToString::to_string),
            fetch_count: view.fetch_count,
            last_fetched_at: view.last_fetched_at.map(|t| t.as_millis()),
        }
    }
}

/// Something the API can report on.
pub trait MirrorSource: Send + Sync {
    fn status(&self) -> StatusResponse;

    /// The current collection as JSON, `None` before the first fetch.
    fn snapshot_json(&self) -> serde_json::Result<Option<Value>>;
}

/// A [`MirrorSource`] reading a subscription's published view.
pub struct Mirror<E> {
    kind: String,
    view: watch::Receiver<SubscriptionView<E>>,
}

impl<E> Mirror<E> {
    pub fn new(kind: impl Into<String>, view: watch::Receiver<SubscriptionView<E>>) -> Self {
        Self {
            kind: kind.into(),
            view,
        }
    }
}

impl<E: Entity + Serialize> MirrorSource for Mirror<E> {
    fn status(&self) -> StatusResponse {
        StatusResponse::from_view(&self.kind, &self.view.borrow())
    }

    fn snapshot_json(&self) -> serde_json::Result<Option<Value>> {
        let snapshot = self.view.borrow().snapshot.clone();
        snapshot.map(|s| serde_json::to_value(&*s)).transpose()
    }
}

async fn status_handler(State(source): State<Arc<dyn MirrorSource>>) -> Json<StatusResponse> {
    Json(source.status())
}

async fn snapshot_handler(
    State(source): State<Arc<dyn MirrorSource>>,
) -> Result<Json<Value>, StatusCode> {
    match source.snapshot_json() {
        Ok(Some(body)) => Ok(Json(body)),
        Ok(None) => Err(StatusCode::SERVICE_UNAVAILABLE),
        Err(e) => {
            warn!("Failed to serialize snapshot: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Build the HTTP API router over the given source.
pub fn build_router(source: Arc<dyn MirrorSource>) -> Router {
    Router::new()
        .route("/api/v1/status", get(status_handler))
        .route("/api/v1/snapshot", get(snapshot_handler))
        .with_state(source)
}
