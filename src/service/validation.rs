//! Field rules for course requests.
//!
//! Rules run in a fixed order and the first failure wins. Title presence is checked on its own
//! because title uniqueness needs the store and must be reported before any later field rule.

use crate::errors::AppError;
use crate::models::{AddCourseDestinationRequest, AddTravelCourseRequest};

const MIN_DURATION: i32 = 1;
const MAX_DURATION: i32 = 3;
const MIN_TRAVELER_COUNT: i32 = 1;

/// A course request that passed every field rule.
#[derive(Debug, Clone)]
pub struct CourseDraft {
    pub title: String,
    pub content: String,
    pub duration: i32,
    pub traveler_count: i32,
    pub travel_type: String,
    pub picture_link: String,
    pub destinations: Vec<AddCourseDestinationRequest>,
    pub tag_ids: Vec<i64>,
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Rule 1: the title is present and not blank.
pub fn require_title(request: &AddTravelCourseRequest) -> Result<&str, AppError> {
    non_blank(&request.title)
        .ok_or_else(|| AppError::invalid_argument("Course title is missing.", "title is empty"))
}

/// Rules 3 to 9, applied after the title has been checked for presence and uniqueness.
pub fn validate_details(title: &str, request: &AddTravelCourseRequest) -> Result<CourseDraft, AppError> {
    let content = non_blank(&request.content)
        .ok_or_else(|| AppError::invalid_argument("Course content is missing.", "content is empty"))?;

    let duration = request
        .duration
        .ok_or_else(|| AppError::invalid_argument("Travel duration is missing.", "duration is null"))?;
    if !(MIN_DURATION..=MAX_DURATION).contains(&duration) {
        return Err(AppError::invalid_argument(
            format!(
                "Travel duration must be between {} and {} days.",
                MIN_DURATION, MAX_DURATION
            ),
            format!("duration: {}", duration),
        ));
    }

    let traveler_count = match request.traveler_count {
        Some(count) if count >= MIN_TRAVELER_COUNT => count,
        other => {
            return Err(AppError::invalid_argument(
                "Traveler count is missing.",
                format!(
                    "traveler count: {}",
                    other.map_or_else(|| "null".to_string(), |c| c.to_string())
                ),
            ))
        }
    };

    let travel_type = non_blank(&request.travel_type)
        .ok_or_else(|| AppError::invalid_argument("Travel type is missing.", "travel type is null"))?;

    let picture_link = non_blank(&request.picture_link).ok_or_else(|| {
        AppError::invalid_argument("Picture link is missing.", "picture link is empty")
    })?;

    let destinations = request
        .course_destinations
        .as_ref()
        .filter(|d| !d.is_empty())
        .ok_or_else(|| {
            AppError::invalid_argument(
                "Course destinations are missing.",
                "course destination is empty",
            )
        })?;

    let tags = request
        .tags
        .as_ref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::invalid_argument("Course tags are missing.", "tag is empty"))?;

    Ok(CourseDraft {
        title: title.to_string(),
        content: content.to_string(),
        duration,
        traveler_count,
        travel_type: travel_type.to_string(),
        picture_link: picture_link.to_string(),
        destinations: destinations.clone(),
        tag_ids: tags.iter().map(|t| t.id).collect(),
    })
}
