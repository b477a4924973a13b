//! Member API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{require_non_blank, success, ApiResult};
use crate::errors::{AppError, Resource};
use crate::models::{CreateMemberRequest, Member};
use crate::AppState;

/// GET /api/members - List all members.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<Member>> {
    success(state.repo.list_members().await?)
}

/// GET /api/members/:id - Get a single member.
pub async fn get_member(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Member> {
    match state.repo.get_member(id).await? {
        Some(member) => success(member),
        None => Err(AppError::not_found(
            Resource::Member,
            "Member does not exist.",
            format!("member ID: {}", id),
        )),
    }
}

/// POST /api/members - Register a new member.
pub async fn create_member(
    State(state): State<AppState>,
    payload: Result<Json<CreateMemberRequest>, JsonRejection>,
) -> ApiResult<Member> {
    let Json(request) = payload?;
    require_non_blank(&request.nickname, "Nickname is required.", "nickname")?;

    let member = state.repo.create_member(&request).await?;
    tracing::info!("Registered member {} ({})", member.id, member.nickname);
    success(member)
}
