//! Database repository for CRUD operations.
//!
//! Reference data (members, destinations, tags) is read and written through the pool. Course
//! aggregate operations run on a connection supplied by the caller, which is always a transaction
//! opened by the course service.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::errors::{is_unique_violation, AppError, Resource};
use crate::models::{
    CourseDestination, CourseOwner, CreateDestinationRequest, CreateMemberRequest,
    CreateTagRequest, Destination, Member, PageRequest, Tag, TravelCourse,
};
use crate::service::{
    CourseDraft, CourseStore, DestinationLookup, MemberLookup, TagAssociationManager,
};

const COURSE_SELECT: &str = r#"SELECT c.id, c.title, c.content, c.duration, c.traveler_count,
                  c.travel_type, c.picture_link, c.views, c.member_id, m.nickname,
                  c.created_at, c.updated_at
           FROM travel_courses c JOIN members m ON m.id = c.member_id"#;

const COURSE_DESTINATION_SELECT: &str = r#"SELECT cd.id, cd.course_id, cd.visit_date, cd.visit_order,
                  d.id AS destination_id, d.name AS destination_name,
                  d.location AS destination_location, d.created_at AS destination_created_at
           FROM course_destinations cd JOIN destinations d ON d.id = cd.destination_id"#;

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ==================== MEMBER OPERATIONS ====================

    /// List all members.
    pub async fn list_members(&self) -> Result<Vec<Member>, AppError> {
        let rows =
            sqlx::query("SELECT id, nickname, email, created_at FROM members ORDER BY nickname")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(member_from_row).collect())
    }

    /// Get a member by ID.
    pub async fn get_member(&self, id: i64) -> Result<Option<Member>, AppError> {
        let row = sqlx::query("SELECT id, nickname, email, created_at FROM members WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(member_from_row))
    }

    /// Register a new member. Nicknames are unique.
    pub async fn create_member(&self, request: &CreateMemberRequest) -> Result<Member, AppError> {
        let nickname = request.nickname.trim();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("INSERT INTO members (nickname, email, created_at) VALUES (?, ?, ?)")
            .bind(nickname)
            .bind(&request.email)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::duplicated("Member already exists.", format!("nickname: {}", nickname))
                } else {
                    e.into()
                }
            })?;

        Ok(Member {
            id: result.last_insert_rowid(),
            nickname: nickname.to_string(),
            email: request.email.clone(),
            created_at: now,
        })
    }

    // ==================== DESTINATION OPERATIONS ====================

    /// List all destinations.
    pub async fn list_destinations(&self) -> Result<Vec<Destination>, AppError> {
        let rows =
            sqlx::query("SELECT id, name, location, created_at FROM destinations ORDER BY name, id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.iter().map(destination_from_row).collect())
    }

    /// Get a destination by ID.
    pub async fn get_destination(&self, id: i64) -> Result<Option<Destination>, AppError> {
        let row =
            sqlx::query("SELECT id, name, location, created_at FROM destinations WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.as_ref().map(destination_from_row))
    }

    /// Create a new destination.
    pub async fn create_destination(
        &self,
        request: &CreateDestinationRequest,
    ) -> Result<Destination, AppError> {
        let name = request.name.trim();
        let now = Utc::now().to_rfc3339();

        let result =
            sqlx::query("INSERT INTO destinations (name, location, created_at) VALUES (?, ?, ?)")
                .bind(name)
                .bind(&request.location)
                .bind(&now)
                .execute(&self.pool)
                .await?;

        Ok(Destination {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            location: request.location.clone(),
            created_at: now,
        })
    }

    // ==================== TAG OPERATIONS ====================

    /// List all tags.
    pub async fn list_tags(&self) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }

    /// Get a tag by ID.
    pub async fn get_tag(&self, id: i64) -> Result<Option<Tag>, AppError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM tags WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(tag_from_row))
    }

    /// Create a new tag. Tag names are unique.
    pub async fn create_tag(&self, request: &CreateTagRequest) -> Result<Tag, AppError> {
        let name = request.name.trim();
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query("INSERT INTO tags (name, description, created_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(&request.description)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::duplicated("Tag already exists.", format!("tag name: {}", name))
                } else {
                    e.into()
                }
            })?;

        Ok(Tag {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            description: request.description.clone(),
            created_at: now,
        })
    }
}

// ==================== COLLABORATOR IMPLEMENTATIONS ====================

#[async_trait]
impl MemberLookup for Repository {
    async fn find_by_nickname(
        &self,
        conn: &mut SqliteConnection,
        nickname: &str,
    ) -> Result<Member, AppError> {
        let row =
            sqlx::query("SELECT id, nickname, email, created_at FROM members WHERE nickname = ?")
                .bind(nickname)
                .fetch_optional(&mut *conn)
                .await?;

        row.as_ref().map(member_from_row).ok_or_else(|| {
            AppError::not_found(
                Resource::Member,
                "Member does not exist.",
                format!("nickname: {}", nickname),
            )
        })
    }
}

#[async_trait]
impl DestinationLookup for Repository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Destination, AppError> {
        let row =
            sqlx::query("SELECT id, name, location, created_at FROM destinations WHERE id = ?")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;

        row.as_ref().map(destination_from_row).ok_or_else(|| {
            AppError::not_found(
                Resource::Destination,
                "Destination does not exist.",
                format!("destination ID: {}", id),
            )
        })
    }
}

#[async_trait]
impl TagAssociationManager for Repository {
    async fn find_tag(&self, conn: &mut SqliteConnection, tag_id: i64) -> Result<Tag, AppError> {
        let row = sqlx::query("SELECT id, name, description, created_at FROM tags WHERE id = ?")
            .bind(tag_id)
            .fetch_optional(&mut *conn)
            .await?;

        row.as_ref().map(tag_from_row).ok_or_else(|| {
            AppError::not_found(
                Resource::Tag,
                "Tag does not exist.",
                format!("tag ID: {}", tag_id),
            )
        })
    }

    async fn add_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
        tag_ids: &[i64],
    ) -> Result<(), AppError> {
        for &tag_id in tag_ids {
            self.find_tag(conn, tag_id).await?;

            sqlx::query("INSERT OR IGNORE INTO course_tags (course_id, tag_id) VALUES (?, ?)")
                .bind(course_id)
                .bind(tag_id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(())
    }

    async fn delete_all_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM course_tags WHERE course_id = ?")
            .bind(course_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_tags_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Vec<Tag>, AppError> {
        let rows = sqlx::query(
            r#"SELECT t.id, t.name, t.description, t.created_at
               FROM course_tags ct JOIN tags t ON t.id = ct.tag_id
               WHERE ct.course_id = ? ORDER BY t.name"#,
        )
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(tag_from_row).collect())
    }
}

#[async_trait]
impl CourseStore for Repository {
    async fn find_by_id(
        &self,
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<TravelCourse>, AppError> {
        let row = sqlx::query(&format!("{} WHERE c.id = ?", COURSE_SELECT))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(course_from_row))
    }

    async fn find_by_title(
        &self,
        conn: &mut SqliteConnection,
        title: &str,
    ) -> Result<Option<TravelCourse>, AppError> {
        let row = sqlx::query(&format!("{} WHERE c.title = ?", COURSE_SELECT))
            .bind(title)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.as_ref().map(course_from_row))
    }

    async fn exists_by_id(&self, conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM travel_courses WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.is_some())
    }

    async fn find_all(&self, conn: &mut SqliteConnection) -> Result<Vec<TravelCourse>, AppError> {
        let rows = sqlx::query(&format!("{} ORDER BY c.id", COURSE_SELECT))
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(course_from_row).collect())
    }

    async fn find_all_order_by_views_desc(
        &self,
        conn: &mut SqliteConnection,
        page: &PageRequest,
    ) -> Result<Vec<TravelCourse>, AppError> {
        // Sort columns come from a closed enum, never from raw input
        let tie_breaker = page
            .sort
            .map(|s| format!(", {} {}", s.field.column(), s.direction.keyword()))
            .unwrap_or_default();
        let sql = format!(
            "{} ORDER BY c.views DESC{}, c.id ASC LIMIT ? OFFSET ?",
            COURSE_SELECT, tie_breaker
        );

        let rows = sqlx::query(&sql)
            .bind(i64::from(page.size))
            .bind(page.offset())
            .fetch_all(&mut *conn)
            .await?;

        Ok(rows.iter().map(course_from_row).collect())
    }

    async fn find_all_by_tag(
        &self,
        conn: &mut SqliteConnection,
        tag_id: i64,
    ) -> Result<Vec<TravelCourse>, AppError> {
        let rows = sqlx::query(&format!(
            "{} JOIN course_tags ct ON ct.course_id = c.id WHERE ct.tag_id = ? ORDER BY c.id",
            COURSE_SELECT
        ))
        .bind(tag_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(course_from_row).collect())
    }

    async fn insert(
        &self,
        conn: &mut SqliteConnection,
        draft: &CourseDraft,
        owner: &CourseOwner,
    ) -> Result<TravelCourse, AppError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO travel_courses (
                title, content, duration, traveler_count, travel_type, picture_link,
                views, member_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?)"#,
        )
        .bind(&draft.title)
        .bind(&draft.content)
        .bind(draft.duration)
        .bind(draft.traveler_count)
        .bind(&draft.travel_type)
        .bind(&draft.picture_link)
        .bind(owner.id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .map_err(|e| title_conflict_or(e, &draft.title))?;

        Ok(TravelCourse {
            id: result.last_insert_rowid(),
            title: draft.title.clone(),
            content: draft.content.clone(),
            duration: draft.duration,
            traveler_count: draft.traveler_count,
            travel_type: draft.travel_type.clone(),
            picture_link: draft.picture_link.clone(),
            views: 0,
            owner: owner.clone(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    async fn save(&self, conn: &mut SqliteConnection, course: &TravelCourse) -> Result<(), AppError> {
        sqlx::query(
            r#"INSERT INTO travel_courses (
                id, title, content, duration, traveler_count, travel_type, picture_link,
                views, member_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title, content = excluded.content,
                duration = excluded.duration, traveler_count = excluded.traveler_count,
                travel_type = excluded.travel_type, picture_link = excluded.picture_link,
                views = excluded.views, member_id = excluded.member_id,
                updated_at = excluded.updated_at"#,
        )
        .bind(course.id)
        .bind(&course.title)
        .bind(&course.content)
        .bind(course.duration)
        .bind(course.traveler_count)
        .bind(&course.travel_type)
        .bind(&course.picture_link)
        .bind(course.views)
        .bind(course.owner.id)
        .bind(&course.created_at)
        .bind(&course.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(|e| title_conflict_or(e, &course.title))?;

        Ok(())
    }

    async fn delete_by_id(&self, conn: &mut SqliteConnection, id: i64) -> Result<(), AppError> {
        sqlx::query("DELETE FROM travel_courses WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn increment_views(&self, conn: &mut SqliteConnection, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("UPDATE travel_courses SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_destination(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
        destination: &Destination,
        date: NaiveDate,
        visit_order: i32,
    ) -> Result<CourseDestination, AppError> {
        let result = sqlx::query(
            "INSERT INTO course_destinations (course_id, destination_id, visit_date, visit_order) VALUES (?, ?, ?, ?)",
        )
        .bind(course_id)
        .bind(destination.id)
        .bind(date)
        .bind(visit_order)
        .execute(&mut *conn)
        .await?;

        Ok(CourseDestination {
            id: result.last_insert_rowid(),
            course_id,
            date,
            visit_order,
            destination: destination.clone(),
        })
    }

    async fn delete_all_destinations_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM course_destinations WHERE course_id = ?")
            .bind(course_id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected())
    }

    async fn find_destinations_by_course(
        &self,
        conn: &mut SqliteConnection,
        course_id: i64,
    ) -> Result<Vec<CourseDestination>, AppError> {
        let rows = sqlx::query(&format!(
            "{} WHERE cd.course_id = ? ORDER BY cd.visit_order, cd.id",
            COURSE_DESTINATION_SELECT
        ))
        .bind(course_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows.iter().map(course_destination_from_row).collect())
    }
}

/// A write that trips the title UNIQUE constraint lost a race with another writer.
fn title_conflict_or(err: sqlx::Error, title: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::duplicated("Course already exists.", format!("title: {}", title))
    } else {
        err.into()
    }
}

// Helper functions for row conversion

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Member {
    Member {
        id: row.get("id"),
        nickname: row.get("nickname"),
        email: row.get("email"),
        created_at: row.get("created_at"),
    }
}

fn destination_from_row(row: &sqlx::sqlite::SqliteRow) -> Destination {
    Destination {
        id: row.get("id"),
        name: row.get("name"),
        location: row.get("location"),
        created_at: row.get("created_at"),
    }
}

fn tag_from_row(row: &sqlx::sqlite::SqliteRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        created_at: row.get("created_at"),
    }
}

fn course_from_row(row: &sqlx::sqlite::SqliteRow) -> TravelCourse {
    TravelCourse {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        duration: row.get("duration"),
        traveler_count: row.get("traveler_count"),
        travel_type: row.get("travel_type"),
        picture_link: row.get("picture_link"),
        views: row.get("views"),
        owner: CourseOwner {
            id: row.get("member_id"),
            nickname: row.get("nickname"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn course_destination_from_row(row: &sqlx::sqlite::SqliteRow) -> CourseDestination {
    CourseDestination {
        id: row.get("id"),
        course_id: row.get("course_id"),
        date: row.get("visit_date"),
        visit_order: row.get("visit_order"),
        destination: Destination {
            id: row.get("destination_id"),
            name: row.get("destination_name"),
            location: row.get("destination_location"),
            created_at: row.get("destination_created_at"),
        },
    }
}
