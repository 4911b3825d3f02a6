use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiErrorBody};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Open event streams across all boards.
    pub subscribers: usize,
    /// Notes across all boards.
    pub notes: usize,
    /// Boards holding at least one note.
    pub boards: usize,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 503, description = "Hub is shutting down", body = ApiErrorBody),
    ),
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let subscribers = state.hub.subscriber_count().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        subscribers,
        notes: state.store.len(),
        boards: state.store.board_count(),
    }))
}
