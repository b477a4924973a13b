//! Narrow interfaces the course service depends on.
//!
//! Each method receives the caller's transaction connection so that all writes of one service
//! operation commit or roll back together.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::SqliteConnection;

use super::CourseDraft;
use crate::errors::AppError;
use crate::models::{CourseDestination, CourseOwner, Destination, Member, PageRequest, Tag, TravelCourse};

/// Resolves members by nickname.
#[async_trait]
pub trait MemberLookup: Send + Sync {
    /// Fails with a member `NotFound` when no member has this nickname.
    async fn find_by_nickname(
        &self,
        conn: &mut SqliteConnection,
        nickname: &str,
    ) -> Result<Member, AppError>;
}

/// Resolves destinations by id.
#[async_trait]
pub trait DestinationLookup: Send + Sync {
    /// Fails with a destination `NotFound` when the id is unknown.
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Destination, AppError>;
}

/// Maintains the links between courses and tags.
#[async_trait]
pub trait TagAssociationManager: Send + Sync {
    /// Fails with a tag `NotFound` when the id is unknown.
    async fn find_tag(&self, conn: &mut SqliteConnection, tag_id: i64) -> Result<Tag, AppError>;

    /// Links every tag to the course. Repeated ids are linked once; unknown ids fail with a tag
    /// `NotFound`.
    async fn add_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
        tag_ids: &[i64],
    ) -> Result<(), AppError>;

    async fn delete_all_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<u64, AppError>;

    async fn find_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Vec<Tag>, AppError>;
}

/// Durable storage for course rows and their itinerary rows.
#[async_trait]
pub trait CourseStore: Send + Sync {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<TravelCourse>, AppError>;

    async fn find_by_title(
        &self,
        conn: &mut SqliteConnection,
        title: &str,
    ) -> Result<Option<TravelCourse>, AppError>;

    async fn exists_by_id(&self, conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError>;

    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<TravelCourse>, AppError>;

    /// Courses by descending view count; the page's sort is applied as a tie-breaker.
    async fn find_all_order_by_views_desc(
        &self,
        conn: &mut SqliteConnection,
        page: &PageRequest,
    ) -> Result<Vec<TravelCourse>, AppError>;

    async fn find_all_by_tag(
        &self,
        conn: &mut SqliteConnection,
        tag_id: i64,
    ) -> Result<Vec<TravelCourse>, AppError>;

    /// Insert a new course with zero views and return it with its assigned id.
    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        draft: &CourseDraft,
        owner: &CourseOwner,
    ) -> Result<TravelCourse, AppError>;

    /// Write every scalar field of the course under its id, inserting it if absent.
    async fn save(&self, conn: &mut SqliteConnection, course: &TravelCourse) -> Result<(), AppError>;

    async fn delete_by_id(&self, conn: &mut SqliteConnection, id: i64) -> Result<(), AppError>;

    /// Atomically add one view. Returns false when the course does not exist.
    async fn increment_views(&self, conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError>;

    async fn insert_destination(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
        destination: &Destination,
        date: NaiveDate,
        visit_order: i32,
    ) -> Result<CourseDestination, AppError>;

    async fn delete_all_destinations_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<u64, AppError>;

    /// Itinerary rows ordered by visit order, then by insertion.
    async fn find_destinations_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Vec<CourseDestination>, AppError>;
}
