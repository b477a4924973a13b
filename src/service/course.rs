//! The course service: save, update, read, view counting and delete.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use super::validation::{require_title, validate_details, CourseDraft};
use super::{CourseStore, DestinationLookup, MemberLookup, TagAssociationManager};
use crate::db::Repository;
use crate::errors::{AppError, Resource};
use crate::models::{
    AddTravelCourseRequest, CourseDetail, CourseOwner, PageRequest, TravelCourse,
};

fn course_not_found(message: &str, id: i64) -> AppError {
    AppError::not_found(Resource::Course, message, format!("course ID: {}", id))
}

fn duplicated_title(title: &str) -> AppError {
    AppError::duplicated("Course already exists.", format!("title: {}", title))
}

/// Commit on success, roll back on failure.
async fn finish<T>(
    tx: Transaction<'static, Sqlite>,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!("Rollback failed after {}: {:?}", err, rollback_err);
            }
            Err(err)
        }
    }
}

/// Assembles and maintains travel course aggregates.
#[derive(Clone)]
pub struct CourseService {
    pool: SqlitePool,
    store: Arc<dyn CourseStore>,
    members: Arc<dyn MemberLookup>,
    destinations: Arc<dyn DestinationLookup>,
    tags: Arc<dyn TagAssociationManager>,
}

impl CourseService {
    pub fn new(
        pool: SqlitePool,
        store: Arc<dyn CourseStore>,
        members: Arc<dyn MemberLookup>,
        destinations: Arc<dyn DestinationLookup>,
        tags: Arc<dyn TagAssociationManager>,
    ) -> Self {
        Self {
            pool,
            store,
            members,
            destinations,
            tags,
        }
    }

    /// Open a transaction holding the write lock from `BEGIN`. Write bodies read before they write,
    /// and a deferred transaction fails with `SQLITE_BUSY` when it upgrades after another commit.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, AppError> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    /// Wire every collaborator to the SQLite repository.
    pub fn from_repository(repo: Arc<Repository>) -> Self {
        Self::new(
            repo.pool().clone(),
            repo.clone(),
            repo.clone(),
            repo.clone(),
            repo,
        )
    }

    /// Validate and persist a new course with its itinerary and tags.
    pub async fn save(&self, request: &AddTravelCourseRequest) -> Result<TravelCourse, AppError> {
        let mut tx = self.begin_write().await?;
        let outcome = self.save_in(&mut *tx, request).await;
        let course = finish(tx, outcome).await?;

        tracing::info!("Saved travel course {} ({})", course.id, course.title);
        Ok(course)
    }

    async fn save_in(
        &self,
        conn: &mut SqliteConnection,
        request: &AddTravelCourseRequest,
    ) -> Result<TravelCourse, AppError> {
        let title = require_title(request)?;
        if self.store.find_by_title(conn, title).await?.is_some() {
            return Err(duplicated_title(title));
        }
        let draft = validate_details(title, request)?;

        let member = self.members.find_by_nickname(conn, &request.nickname).await?;
        let owner = CourseOwner {
            id: member.id,
            nickname: member.nickname,
        };

        let course = self.store.insert(conn, &draft, &owner).await?;
        self.attach_destinations(conn, course.id, &draft).await?;
        self.tags
            .add_tags_by_course(conn, course.id, &draft.tag_ids)
            .await?;

        Ok(course)
    }

    /// Replace every field, itinerary stop and tag of an existing course.
    ///
    /// Itinerary rows and tag links are deleted and recreated rather than merged, and the view
    /// count starts over. The course may keep its own title, but taking a title that another
    /// course already uses fails with `Duplicated`.
    pub async fn update(
        &self,
        id: i64,
        request: &AddTravelCourseRequest,
    ) -> Result<TravelCourse, AppError> {
        let mut tx = self.begin_write().await?;
        let outcome = self.update_in(&mut *tx, id, request).await;
        let course = finish(tx, outcome).await?;

        tracing::info!("Updated travel course {} ({})", course.id, course.title);
        Ok(course)
    }

    async fn update_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
        request: &AddTravelCourseRequest,
    ) -> Result<TravelCourse, AppError> {
        let existing = self
            .store
            .find_by_id(conn, id)
            .await?
            .ok_or_else(|| course_not_found("Course to update does not exist.", id))?;

        let title = require_title(request)?;
        if let Some(other) = self.store.find_by_title(conn, title).await? {
            if other.id != id {
                return Err(duplicated_title(title));
            }
        }
        let draft = validate_details(title, request)?;

        let member = self.members.find_by_nickname(conn, &request.nickname).await?;
        let course = TravelCourse {
            id,
            title: draft.title.clone(),
            content: draft.content.clone(),
            duration: draft.duration,
            traveler_count: draft.traveler_count,
            travel_type: draft.travel_type.clone(),
            picture_link: draft.picture_link.clone(),
            views: 0,
            owner: CourseOwner {
                id: member.id,
                nickname: member.nickname,
            },
            created_at: existing.created_at,
            updated_at: Utc::now().to_rfc3339(),
        };
        self.store.save(conn, &course).await?;

        self.store.delete_all_destinations_by_course(conn, id).await?;
        self.attach_destinations(conn, id, &draft).await?;

        self.tags.delete_all_tags_by_course(conn, id).await?;
        self.tags.add_tags_by_course(conn, id, &draft.tag_ids).await?;

        self.store.save(conn, &course).await?;
        Ok(course)
    }

    /// Resolve and insert itinerary rows in request order, keeping each visit order as given.
    async fn attach_destinations(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
        draft: &CourseDraft,
    ) -> Result<(), AppError> {
        for entry in &draft.destinations {
            let destination = self.destinations.find_by_id(conn, entry.destination_id).await?;
            self.store
                .insert_destination(conn, course_id, &destination, entry.date, entry.visit_order)
                .await?;
        }
        Ok(())
    }

    pub async fn find_all(&self) -> Result<Vec<TravelCourse>, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.store.find_all(&mut *tx).await;
        finish(tx, outcome).await
    }

    /// A page of courses, most viewed first.
    pub async fn get_all_order_by_views_desc(
        &self,
        page: &PageRequest,
    ) -> Result<Vec<TravelCourse>, AppError> {
        if page.size == 0 {
            return Err(AppError::invalid_argument(
                "Page size must be greater than zero.",
                "size: 0",
            ));
        }

        let mut tx = self.pool.begin().await?;
        let outcome = self.store.find_all_order_by_views_desc(&mut *tx, page).await;
        finish(tx, outcome).await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<TravelCourse, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.find_by_id_in(&mut *tx, id).await;
        finish(tx, outcome).await
    }

    async fn find_by_id_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<TravelCourse, AppError> {
        self.store
            .find_by_id(conn, id)
            .await?
            .ok_or_else(|| course_not_found("Course does not exist.", id))
    }

    /// A course with its itinerary and tags.
    pub async fn find_detail(&self, id: i64) -> Result<CourseDetail, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.find_detail_in(&mut *tx, id).await;
        finish(tx, outcome).await
    }

    async fn find_detail_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<CourseDetail, AppError> {
        let course = self.find_by_id_in(conn, id).await?;
        self.detail_of(conn, course).await
    }

    async fn detail_of(
        &self,
        conn: &mut SqliteConnection,
        course: TravelCourse,
    ) -> Result<CourseDetail, AppError> {
        let course_destinations = self.store.find_destinations_by_course(conn, course.id).await?;
        let tags = self.tags.find_tags_by_course(conn, course.id).await?;
        Ok(CourseDetail {
            course,
            course_destinations,
            tags,
        })
    }

    /// Every course with its itinerary and tags, read in one transaction.
    pub async fn find_all_details(&self) -> Result<Vec<CourseDetail>, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.find_all_details_in(&mut *tx).await;
        finish(tx, outcome).await
    }

    async fn find_all_details_in(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<CourseDetail>, AppError> {
        let courses = self.store.find_all(conn).await?;
        let mut details = Vec::with_capacity(courses.len());
        for course in courses {
            details.push(self.detail_of(conn, course).await?);
        }
        Ok(details)
    }

    /// Courses linked to a tag. Fails when the tag itself is unknown.
    pub async fn find_courses_by_tag(&self, tag_id: i64) -> Result<Vec<TravelCourse>, AppError> {
        let mut tx = self.pool.begin().await?;
        let outcome = self.find_courses_by_tag_in(&mut *tx, tag_id).await;
        finish(tx, outcome).await
    }

    async fn find_courses_by_tag_in(
        &self,
        conn: &mut SqliteConnection,
        tag_id: i64,
    ) -> Result<Vec<TravelCourse>, AppError> {
        self.tags.find_tag(conn, tag_id).await?;
        self.store.find_all_by_tag(conn, tag_id).await
    }

    /// Delete a course. Itinerary rows and tag links go with it through the store's cascades.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let mut tx = self.begin_write().await?;
        let outcome = self.delete_in(&mut *tx, id).await;
        finish(tx, outcome).await?;

        tracing::info!("Deleted travel course {}", id);
        Ok(())
    }

    async fn delete_in(&self, conn: &mut SqliteConnection, id: i64) -> Result<(), AppError> {
        if !self.store.exists_by_id(conn, id).await? {
            return Err(course_not_found("Course to delete does not exist.", id));
        }
        self.store.delete_by_id(conn, id).await
    }

    /// Add one view and return the updated course.
    pub async fn increment_views(&self, id: i64) -> Result<TravelCourse, AppError> {
        let mut tx = self.begin_write().await?;
        let outcome = self.increment_views_in(&mut *tx, id).await;
        finish(tx, outcome).await
    }

    async fn increment_views_in(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<TravelCourse, AppError> {
        if !self.store.increment_views(conn, id).await? {
            return Err(course_not_found("Course does not exist.", id));
        }
        self.find_by_id_in(conn, id).await
    }
}
