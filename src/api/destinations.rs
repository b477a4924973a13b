//! Destination API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{require_non_blank, success, ApiResult};
use crate::errors::{AppError, Resource};
use crate::models::{CreateDestinationRequest, Destination};
use crate::AppState;

/// GET /api/destinations - List all destinations.
pub async fn list_destinations(State(state): State<AppState>) -> ApiResult<Vec<Destination>> {
    success(state.repo.list_destinations().await?)
}

/// GET /api/destinations/:id - Get a single destination.
pub async fn get_destination(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Destination> {
    match state.repo.get_destination(id).await? {
        Some(destination) => success(destination),
        None => Err(AppError::not_found(
            Resource::Destination,
            "Destination does not exist.",
            format!("destination ID: {}", id),
        )),
    }
}

/// POST /api/destinations - Create a new destination.
pub async fn create_destination(
    State(state): State<AppState>,
    payload: Result<Json<CreateDestinationRequest>, JsonRejection>,
) -> ApiResult<Destination> {
    let Json(request) = payload?;
    require_non_blank(&request.name, "Destination name is required.", "name")?;

    success(state.repo.create_destination(&request).await?)
}
