//! Search API endpoints.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::models::TravelCourse;
use crate::search::SearchResult;
use crate::service::CourseService;
use crate::AppState;

/// Search query parameters.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    /// Search query string.
    pub q: String,
    /// Maximum number of results (default: 20).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    20
}

/// Search results with paging metadata.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResultItem>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Single search hit.
#[derive(Debug, Serialize)]
pub struct SearchResultItem {
    pub course: TravelCourse,
    pub score: f32,
}

/// Maximum number of search results allowed.
const MAX_SEARCH_LIMIT: usize = 100;

/// GET /api/search - Full-text search over courses.
pub async fn search_courses(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<SearchResponse> {
    let limit = params.limit.min(MAX_SEARCH_LIMIT);
    let hits = state.search.search(&params.q, limit, params.offset)?;

    let results = resolve_hits(&state.courses, hits).await?;

    let total = results.len();
    success(SearchResponse {
        results,
        total,
        limit,
        offset: params.offset,
    })
}

/// Load the course behind each hit. Hits for courses deleted since the last index commit are
/// skipped; any other failure is returned.
async fn resolve_hits(
    courses: &CourseService,
    hits: Vec<SearchResult>,
) -> Result<Vec<SearchResultItem>, AppError> {
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        match courses.find_by_id(hit.course_id).await {
            Ok(course) => results.push(SearchResultItem {
                course,
                score: hit.score,
            }),
            Err(AppError::NotFound { .. }) => {
                tracing::debug!("Skipping search hit for missing course {}", hit.course_id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(results)
}
