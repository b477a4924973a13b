//! Travel course aggregate models.
//!
//! A course is stored as one `travel_courses` row plus its ordered `course_destinations` rows and
//! its `course_tags` links. The request shapes keep every field optional so that validation can
//! tell a missing field apart from a malformed one.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{Destination, Tag};

/// The member who owns a course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseOwner {
    pub id: i64,
    pub nickname: String,
}

/// A multi-day travel course.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TravelCourse {
    pub id: i64,
    pub title: String,
    pub content: String,
    /// Length of the trip in days, 1 to 3 inclusive
    pub duration: i32,
    pub traveler_count: i32,
    pub travel_type: String,
    pub picture_link: String,
    pub views: i64,
    pub owner: CourseOwner,
    pub created_at: String,
    pub updated_at: String,
}

/// One stop of a course itinerary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseDestination {
    pub id: i64,
    pub course_id: i64,
    pub date: NaiveDate,
    pub visit_order: i32,
    pub destination: Destination,
}

/// A course together with its itinerary and tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: TravelCourse,
    pub course_destinations: Vec<CourseDestination>,
    pub tags: Vec<Tag>,
}

/// Request body for creating a course, and for replacing one on update.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddTravelCourseRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub duration: Option<i32>,
    #[serde(default)]
    pub traveler_count: Option<i32>,
    #[serde(default)]
    pub travel_type: Option<String>,
    #[serde(default)]
    pub picture_link: Option<String>,
    /// Nickname of the owning member
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub course_destinations: Option<Vec<AddCourseDestinationRequest>>,
    #[serde(default)]
    pub tags: Option<Vec<TagRef>>,
}

/// A requested itinerary stop.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCourseDestinationRequest {
    pub destination_id: i64,
    pub date: NaiveDate,
    pub visit_order: i32,
}

/// A tag reference inside a course request. Other tag fields sent by clients are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct TagRef {
    pub id: i64,
}
