//! Tag API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{require_non_blank, success, ApiResult};
use crate::errors::{AppError, Resource};
use crate::models::{CreateTagRequest, Tag, TravelCourse};
use crate::AppState;

/// GET /api/tags - List all tags.
pub async fn list_tags(State(state): State<AppState>) -> ApiResult<Vec<Tag>> {
    success(state.repo.list_tags().await?)
}

/// GET /api/tags/:id - Get a single tag.
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Tag> {
    match state.repo.get_tag(id).await? {
        Some(tag) => success(tag),
        None => Err(AppError::not_found(
            Resource::Tag,
            "Tag does not exist.",
            format!("tag ID: {}", id),
        )),
    }
}

/// POST /api/tags - Create a new tag.
pub async fn create_tag(
    State(state): State<AppState>,
    payload: Result<Json<CreateTagRequest>, JsonRejection>,
) -> ApiResult<Tag> {
    let Json(request) = payload?;
    require_non_blank(&request.name, "Tag name is required.", "name")?;

    success(state.repo.create_tag(&request).await?)
}

/// GET /api/tags/:id/courses - Courses carrying a tag.
pub async fn list_courses_by_tag(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Vec<TravelCourse>> {
    success(state.courses.find_courses_by_tag(id).await?)
}
