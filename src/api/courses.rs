//! Travel course API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::{AddTravelCourseRequest, CourseDetail, PageRequest, SortOrder, TravelCourse};
use crate::AppState;

/// Query parameters for the popular-courses listing.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Zero-based page index (default: 0).
    #[serde(default)]
    pub page: u32,
    /// Page size (default: 20), clamped to the configured maximum.
    #[serde(default = "default_page_size")]
    pub size: u32,
    /// Tie-breaking sort as `field` or `field,dir`.
    #[serde(default)]
    pub sort: Option<String>,
}

fn default_page_size() -> u32 {
    20
}

impl PageQuery {
    fn into_page_request(self, max_size: u32) -> Result<PageRequest, AppError> {
        let page = PageRequest::of(self.page, self.size.min(max_size));
        match self.sort.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(sort) => Ok(page.with_sort(sort.parse::<SortOrder>()?)),
            None => Ok(page),
        }
    }
}

/// Refresh a course's search document. Failures are logged, never returned.
async fn reindex(state: &AppState, id: i64) {
    let detail = match state.courses.find_detail(id).await {
        Ok(detail) => detail,
        Err(e) => {
            tracing::warn!("Failed to load course {} for indexing: {}", id, e);
            return;
        }
    };
    if let Err(e) = state.search.index_course(&detail).await {
        tracing::warn!("Failed to index course {}: {}", id, e);
    }
}

/// GET /api/courses - List all courses.
pub async fn list_courses(State(state): State<AppState>) -> ApiResult<Vec<TravelCourse>> {
    success(state.courses.find_all().await?)
}

/// GET /api/courses/popular - A page of courses, most viewed first.
pub async fn list_popular_courses(
    State(state): State<AppState>,
    Query(params): Query<PageQuery>,
) -> ApiResult<Vec<TravelCourse>> {
    let page = params.into_page_request(state.config.max_page_size)?;
    success(state.courses.get_all_order_by_views_desc(&page).await?)
}

/// GET /api/courses/:id - A course with its itinerary and tags.
pub async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<CourseDetail> {
    success(state.courses.find_detail(id).await?)
}

/// POST /api/courses - Create a new course.
pub async fn create_course(
    State(state): State<AppState>,
    payload: Result<Json<AddTravelCourseRequest>, JsonRejection>,
) -> ApiResult<TravelCourse> {
    let Json(request) = payload?;
    let course = state.courses.save(&request).await?;
    reindex(&state, course.id).await;
    success(course)
}

/// PUT /api/courses/:id - Replace a course.
pub async fn update_course(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    payload: Result<Json<AddTravelCourseRequest>, JsonRejection>,
) -> ApiResult<TravelCourse> {
    let Json(request) = payload?;
    let course = state.courses.update(id, &request).await?;
    reindex(&state, course.id).await;
    success(course)
}

/// DELETE /api/courses/:id - Delete a course.
pub async fn delete_course(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    state.courses.delete(id).await?;

    if let Err(e) = state.search.remove_course(id).await {
        tracing::warn!("Failed to remove course {} from index: {}", id, e);
    }
    success(())
}

/// POST /api/courses/:id/views - Count one view.
pub async fn increment_course_views(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<TravelCourse> {
    success(state.courses.increment_views(id).await?)
}
