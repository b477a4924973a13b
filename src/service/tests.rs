//! Course service tests against a real SQLite database.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tempfile::TempDir;

use super::{CourseService, TagAssociationManager};
use crate::db::{init_database, Repository};
use crate::errors::{AppError, Resource};
use crate::models::{
    AddCourseDestinationRequest, AddTravelCourseRequest, CreateDestinationRequest,
    CreateMemberRequest, CreateTagRequest, PageRequest, SortOrder, Tag, TagRef,
};

/// A database seeded with one member, three destinations and three tags.
struct Fixture {
    repo: Arc<Repository>,
    service: CourseService,
    destination_ids: Vec<i64>,
    tag_ids: Vec<i64>,
    _temp_dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let pool = init_database(&temp_dir.path().join("test.sqlite"))
            .await
            .expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));

        repo.create_member(&CreateMemberRequest {
            nickname: "alice".to_string(),
            email: None,
        })
        .await
        .unwrap();

        let mut destination_ids = Vec::new();
        for name in ["Gyeongbokgung", "Myeongdong", "Namsan Tower"] {
            let destination = repo
                .create_destination(&CreateDestinationRequest {
                    name: name.to_string(),
                    location: Some("Seoul".to_string()),
                })
                .await
                .unwrap();
            destination_ids.push(destination.id);
        }

        let mut tag_ids = Vec::new();
        for name in ["night", "food", "history"] {
            let tag = repo
                .create_tag(&CreateTagRequest {
                    name: name.to_string(),
                    description: None,
                })
                .await
                .unwrap();
            tag_ids.push(tag.id);
        }

        let service = CourseService::from_repository(repo.clone());

        Fixture {
            repo,
            service,
            destination_ids,
            tag_ids,
            _temp_dir: temp_dir,
        }
    }

    fn pool(&self) -> &SqlitePool {
        self.repo.pool()
    }

    async fn count(&self, table: &str) -> i64 {
        sqlx::query(&format!("SELECT COUNT(*) AS n FROM {}", table))
            .fetch_one(self.pool())
            .await
            .unwrap()
            .get("n")
    }

    /// Itinerary as (destination id, visit order) pairs, in stored order.
    async fn itinerary(&self, course_id: i64) -> Vec<(i64, i32)> {
        self.service
            .find_detail(course_id)
            .await
            .unwrap()
            .course_destinations
            .iter()
            .map(|cd| (cd.destination.id, cd.visit_order))
            .collect()
    }

    async fn tag_ids_of(&self, course_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .service
            .find_detail(course_id)
            .await
            .unwrap()
            .tags
            .iter()
            .map(|t| t.id)
            .collect();
        ids.sort();
        ids
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn request(title: &str, stops: &[(i64, i32)], tags: &[i64]) -> AddTravelCourseRequest {
    AddTravelCourseRequest {
        title: Some(title.to_string()),
        content: Some("walk".to_string()),
        duration: Some(2),
        traveler_count: Some(2),
        travel_type: Some("CITY".to_string()),
        picture_link: Some("http://x/1.png".to_string()),
        nickname: "alice".to_string(),
        course_destinations: Some(
            stops
                .iter()
                .map(|&(destination_id, visit_order)| AddCourseDestinationRequest {
                    destination_id,
                    date: date(1),
                    visit_order,
                })
                .collect(),
        ),
        tags: Some(tags.iter().map(|&id| TagRef { id }).collect()),
    }
}

fn assert_not_found(result: Result<impl std::fmt::Debug, AppError>, expected: Resource) {
    match result {
        Err(AppError::NotFound { resource, .. }) => assert_eq!(resource, expected),
        other => panic!("expected {:?} not found, got {:?}", expected, other),
    }
}

#[tokio::test]
async fn test_save_persists_course_itinerary_and_tags() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;
    let t = &fx.tag_ids;

    let course = fx
        .service
        .save(&request("Seoul Night", &[(d[0], 1), (d[2], 2)], &[t[0]]))
        .await
        .unwrap();

    assert!(course.id > 0);
    assert_eq!(course.views, 0);
    assert_eq!(course.owner.nickname, "alice");

    let found = fx.service.find_by_id(course.id).await.unwrap();
    assert_eq!(found.title, "Seoul Night");
    assert_eq!(found.content, "walk");
    assert_eq!(found.duration, 2);
    assert_eq!(found.traveler_count, 2);
    assert_eq!(found.travel_type, "CITY");
    assert_eq!(found.picture_link, "http://x/1.png");

    assert_eq!(fx.count("travel_courses").await, 1);
    assert_eq!(fx.itinerary(course.id).await, vec![(d[0], 1), (d[2], 2)]);
    assert_eq!(fx.tag_ids_of(course.id).await, vec![t[0]]);
}

#[tokio::test]
async fn test_visit_order_is_taken_from_entries_not_positions() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;

    let course = fx
        .service
        .save(&request("Reverse Walk", &[(d[0], 3), (d[1], 1), (d[2], 2)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    assert_eq!(
        fx.itinerary(course.id).await,
        vec![(d[1], 1), (d[2], 2), (d[0], 3)]
    );
}

#[tokio::test]
async fn test_repeated_tag_ids_are_linked_once() {
    let fx = Fixture::new().await;
    let t = &fx.tag_ids;

    let course = fx
        .service
        .save(&request("Tag Twice", &[(fx.destination_ids[0], 1)], &[t[1], t[1], t[2]]))
        .await
        .unwrap();

    assert_eq!(fx.tag_ids_of(course.id).await, vec![t[1], t[2]]);
}

#[tokio::test]
async fn test_invalid_requests_write_nothing() {
    let fx = Fixture::new().await;
    let base = request("Broken", &[(fx.destination_ids[0], 1)], &[fx.tag_ids[0]]);

    let mut cases = Vec::new();
    let mut r = base.clone();
    r.title = None;
    cases.push(r);
    let mut r = base.clone();
    r.content = Some(String::new());
    cases.push(r);
    let mut r = base.clone();
    r.duration = Some(4);
    cases.push(r);
    let mut r = base.clone();
    r.traveler_count = Some(0);
    cases.push(r);
    let mut r = base.clone();
    r.travel_type = None;
    cases.push(r);
    let mut r = base.clone();
    r.picture_link = None;
    cases.push(r);
    let mut r = base.clone();
    r.course_destinations = Some(vec![]);
    cases.push(r);
    let mut r = base.clone();
    r.tags = Some(vec![]);
    cases.push(r);

    for case in &cases {
        let result = fx.service.save(case).await;
        assert!(
            matches!(result, Err(AppError::InvalidArgument { .. })),
            "expected invalid argument, got {:?}",
            result
        );
    }

    assert_eq!(fx.count("travel_courses").await, 0);
    assert_eq!(fx.count("course_destinations").await, 0);
    assert_eq!(fx.count("course_tags").await, 0);
}

#[tokio::test]
async fn test_duplicate_title_is_rejected_before_other_rules() {
    let fx = Fixture::new().await;
    let stops = [(fx.destination_ids[0], 1)];
    let tags = [fx.tag_ids[0]];

    fx.service.save(&request("Seoul Night", &stops, &tags)).await.unwrap();

    let mut again = request("Seoul Night", &stops, &tags);
    again.content = None;
    let result = fx.service.save(&again).await;

    match result {
        Err(AppError::Duplicated { detail, .. }) => assert_eq!(detail, "title: Seoul Night"),
        other => panic!("expected duplicated, got {:?}", other),
    }
    assert_eq!(fx.count("travel_courses").await, 1);
    assert_eq!(fx.count("course_destinations").await, 1);
}

#[tokio::test]
async fn test_unknown_member_is_reported_and_nothing_written() {
    let fx = Fixture::new().await;
    let mut req = request("Nobody's Course", &[(fx.destination_ids[0], 1)], &[fx.tag_ids[0]]);
    req.nickname = "mallory".to_string();

    assert_not_found(fx.service.save(&req).await, Resource::Member);
    assert_eq!(fx.count("travel_courses").await, 0);
}

#[tokio::test]
async fn test_unknown_destination_rolls_back_course_and_earlier_stops() {
    let fx = Fixture::new().await;
    let req = request(
        "Half Built",
        &[(fx.destination_ids[0], 1), (9_999, 2)],
        &[fx.tag_ids[0]],
    );

    assert_not_found(fx.service.save(&req).await, Resource::Destination);
    assert_eq!(fx.count("travel_courses").await, 0);
    assert_eq!(fx.count("course_destinations").await, 0);
}

#[tokio::test]
async fn test_unknown_tag_rolls_back_everything() {
    let fx = Fixture::new().await;
    let req = request(
        "Bad Tag",
        &[(fx.destination_ids[0], 1)],
        &[fx.tag_ids[0], 9_999],
    );

    assert_not_found(fx.service.save(&req).await, Resource::Tag);
    assert_eq!(fx.count("travel_courses").await, 0);
    assert_eq!(fx.count("course_destinations").await, 0);
    assert_eq!(fx.count("course_tags").await, 0);
}

/// Tag manager that fails every attach.
struct UnavailableTags;

#[async_trait]
impl TagAssociationManager for UnavailableTags {
    async fn find_tag(&self, _conn: &mut SqliteConnection, _tag_id: i64) -> Result<Tag, AppError> {
        Err(AppError::Internal("tag service unavailable".to_string()))
    }

    async fn add_tags_by_course(
        &self,
        _conn: &mut SqliteConnection,
        _course_id: i64,
        _tag_ids: &[i64],
    ) -> Result<(), AppError> {
        Err(AppError::Internal("tag service unavailable".to_string()))
    }

    async fn delete_all_tags_by_course(
        &self,
        _conn: &mut SqliteConnection,
        _course_id: i64,
    ) -> Result<u64, AppError> {
        Ok(0)
    }

    async fn find_tags_by_course(
        &self,
        _conn: &mut SqliteConnection,
        _course_id: i64,
    ) -> Result<Vec<Tag>, AppError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_collaborator_failure_rolls_back_save_and_update() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;
    let existing = fx
        .service
        .save(&request("Stable", &[(d[0], 1)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    let repo = fx.repo.clone();
    let broken = CourseService::new(
        repo.pool().clone(),
        repo.clone(),
        repo.clone(),
        repo.clone(),
        Arc::new(UnavailableTags),
    );

    let result = broken
        .save(&request("Never Stored", &[(d[1], 1)], &[fx.tag_ids[1]]))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));
    assert_eq!(fx.count("travel_courses").await, 1);
    assert_eq!(fx.count("course_destinations").await, 1);

    let result = broken
        .update(existing.id, &request("Renamed", &[(d[1], 1), (d[2], 2)], &[fx.tag_ids[1]]))
        .await;
    assert!(matches!(result, Err(AppError::Internal(_))));

    let unchanged = fx.service.find_by_id(existing.id).await.unwrap();
    assert_eq!(unchanged.title, "Stable");
    assert_eq!(fx.itinerary(existing.id).await, vec![(d[0], 1)]);
    assert_eq!(fx.tag_ids_of(existing.id).await, vec![fx.tag_ids[0]]);
}

#[tokio::test]
async fn test_update_of_missing_course_changes_nothing() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;
    let course = fx
        .service
        .save(&request("Only One", &[(d[0], 1)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    let result = fx
        .service
        .update(course.id + 100, &request("Ghost", &[(d[1], 1)], &[fx.tag_ids[1]]))
        .await;

    assert_not_found(result, Resource::Course);
    assert_eq!(fx.count("travel_courses").await, 1);
    assert_eq!(fx.itinerary(course.id).await, vec![(d[0], 1)]);
    assert_eq!(fx.tag_ids_of(course.id).await, vec![fx.tag_ids[0]]);
}

#[tokio::test]
async fn test_update_replaces_itinerary_and_tags() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;
    let t = &fx.tag_ids;
    let course = fx
        .service
        .save(&request("Day Trip", &[(d[0], 1), (d[1], 2)], &[t[0], t[1]]))
        .await
        .unwrap();
    let old_row_ids: Vec<i64> = fx
        .service
        .find_detail(course.id)
        .await
        .unwrap()
        .course_destinations
        .iter()
        .map(|cd| cd.id)
        .collect();

    let mut replacement = request("Day Trip Revised", &[(d[2], 1)], &[t[2]]);
    replacement.duration = Some(3);
    let updated = fx.service.update(course.id, &replacement).await.unwrap();

    assert_eq!(updated.id, course.id);
    assert_eq!(updated.title, "Day Trip Revised");
    assert_eq!(updated.duration, 3);

    let detail = fx.service.find_detail(course.id).await.unwrap();
    assert_eq!(detail.course.title, "Day Trip Revised");
    assert_eq!(fx.itinerary(course.id).await, vec![(d[2], 1)]);
    assert_eq!(fx.tag_ids_of(course.id).await, vec![t[2]]);
    assert!(detail
        .course_destinations
        .iter()
        .all(|cd| !old_row_ids.contains(&cd.id)));
    assert_eq!(fx.count("course_destinations").await, 1);
    assert_eq!(fx.count("course_tags").await, 1);
}

#[tokio::test]
async fn test_update_may_keep_its_own_title_but_not_take_another() {
    let fx = Fixture::new().await;
    let stops = [(fx.destination_ids[0], 1)];
    let tags = [fx.tag_ids[0]];
    let first = fx.service.save(&request("First", &stops, &tags)).await.unwrap();
    let second = fx.service.save(&request("Second", &stops, &tags)).await.unwrap();

    let mut same_title = request("First", &stops, &tags);
    same_title.content = Some("a longer walk".to_string());
    let updated = fx.service.update(first.id, &same_title).await.unwrap();
    assert_eq!(updated.content, "a longer walk");

    let result = fx.service.update(second.id, &request("First", &stops, &tags)).await;
    assert!(matches!(result, Err(AppError::Duplicated { .. })));
    assert_eq!(fx.service.find_by_id(second.id).await.unwrap().title, "Second");
}

#[tokio::test]
async fn test_update_starts_view_count_over() {
    let fx = Fixture::new().await;
    let stops = [(fx.destination_ids[0], 1)];
    let tags = [fx.tag_ids[0]];
    let course = fx.service.save(&request("Popular", &stops, &tags)).await.unwrap();

    fx.service.increment_views(course.id).await.unwrap();
    fx.service.increment_views(course.id).await.unwrap();

    let updated = fx.service.update(course.id, &request("Popular", &stops, &tags)).await.unwrap();
    assert_eq!(updated.views, 0);
    assert_eq!(fx.service.find_by_id(course.id).await.unwrap().views, 0);
    assert_eq!(updated.created_at, course.created_at);
}

#[tokio::test]
async fn test_increment_views_counts_each_call() {
    let fx = Fixture::new().await;
    let course = fx
        .service
        .save(&request("Counted", &[(fx.destination_ids[0], 1)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    for expected in 1..=5 {
        let bumped = fx.service.increment_views(course.id).await.unwrap();
        assert_eq!(bumped.views, expected);
    }
    assert_eq!(fx.service.find_by_id(course.id).await.unwrap().views, 5);

    assert_not_found(fx.service.increment_views(course.id + 1).await, Resource::Course);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_increments_are_not_lost() {
    let fx = Fixture::new().await;
    let course = fx
        .service
        .save(&request("Busy", &[(fx.destination_ids[0], 1)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    let service = Arc::new(fx.service.clone());
    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = service.clone();
        let id = course.id;
        handles.push(tokio::spawn(async move { service.increment_views(id).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fx.service.find_by_id(course.id).await.unwrap().views, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_all_succeed() {
    let fx = Fixture::new().await;
    let service = Arc::new(fx.service.clone());
    let stops = vec![(fx.destination_ids[0], 1), (fx.destination_ids[1], 2)];
    let tags = vec![fx.tag_ids[0]];

    let mut handles = Vec::new();
    for n in 0..20 {
        let service = service.clone();
        let req = request(&format!("Parallel Course {}", n), &stops, &tags);
        handles.push(tokio::spawn(async move { service.save(&req).await }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "concurrent save failed: {:?}", result);
    }

    assert_eq!(fx.count("travel_courses").await, 20);
    assert_eq!(fx.count("course_destinations").await, 40);
    assert_eq!(fx.count("course_tags").await, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_saves_of_one_title_keep_a_single_course() {
    let fx = Fixture::new().await;
    let service = Arc::new(fx.service.clone());
    let stops = vec![(fx.destination_ids[0], 1)];
    let tags = vec![fx.tag_ids[0]];

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = service.clone();
        let req = request("Contested", &stops, &tags);
        handles.push(tokio::spawn(async move { service.save(&req).await }));
    }

    let mut saved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => saved += 1,
            Err(AppError::Duplicated { .. }) => {}
            Err(other) => panic!("expected duplicated, got {:?}", other),
        }
    }

    assert_eq!(saved, 1);
    assert_eq!(fx.count("travel_courses").await, 1);
    assert_eq!(fx.count("course_destinations").await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_and_deletes_do_not_fail_with_busy() {
    let fx = Fixture::new().await;
    let service = Arc::new(fx.service.clone());
    let stops = vec![(fx.destination_ids[0], 1)];
    let tags = vec![fx.tag_ids[0]];

    let mut ids = Vec::new();
    for n in 0..10 {
        let course = fx
            .service
            .save(&request(&format!("Course {}", n), &stops, &tags))
            .await
            .unwrap();
        ids.push(course.id);
    }

    let mut handles = Vec::new();
    for (n, id) in ids.iter().copied().enumerate() {
        let service = service.clone();
        let req = request(&format!("Course {} Revised", n), &stops, &tags);
        handles.push(tokio::spawn(async move {
            if n % 2 == 0 {
                service.update(id, &req).await.map(|_| ())
            } else {
                service.delete(id).await
            }
        }));
    }
    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok(), "concurrent write failed: {:?}", result);
    }

    assert_eq!(fx.count("travel_courses").await, 5);
    assert_eq!(fx.count("course_destinations").await, 5);
}

#[tokio::test]
async fn test_delete_cascades_to_itinerary_and_tags() {
    let fx = Fixture::new().await;
    let d = &fx.destination_ids;
    let course = fx
        .service
        .save(&request("Short Lived", &[(d[0], 1), (d[1], 2)], &[fx.tag_ids[0]]))
        .await
        .unwrap();

    fx.service.delete(course.id).await.unwrap();

    assert_not_found(fx.service.find_by_id(course.id).await, Resource::Course);
    assert_eq!(fx.count("course_destinations").await, 0);
    assert_eq!(fx.count("course_tags").await, 0);
    // Referenced records are untouched
    assert_eq!(fx.count("destinations").await, 3);
    assert_eq!(fx.count("tags").await, 3);

    assert_not_found(fx.service.delete(course.id).await, Resource::Course);
}

#[tokio::test]
async fn test_popular_courses_are_paged_by_views() {
    let fx = Fixture::new().await;
    let stops = [(fx.destination_ids[0], 1)];
    let tags = [fx.tag_ids[0]];

    let mut ids = Vec::new();
    for (title, views) in [("Quiet", 0), ("Loved", 3), ("Liked", 1), ("Also Liked", 1)] {
        let course = fx.service.save(&request(title, &stops, &tags)).await.unwrap();
        for _ in 0..views {
            fx.service.increment_views(course.id).await.unwrap();
        }
        ids.push(course.id);
    }

    let first_page = fx
        .service
        .get_all_order_by_views_desc(&PageRequest::of(0, 2))
        .await
        .unwrap();
    let titles: Vec<&str> = first_page.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Loved", "Liked"]);

    let by_title = PageRequest::of(0, 10).with_sort("title,asc".parse::<SortOrder>().unwrap());
    let all = fx.service.get_all_order_by_views_desc(&by_title).await.unwrap();
    let titles: Vec<&str> = all.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Loved", "Also Liked", "Liked", "Quiet"]);

    let last_page = fx
        .service
        .get_all_order_by_views_desc(&PageRequest::of(1, 3))
        .await
        .unwrap();
    assert_eq!(last_page.len(), 1);
    assert_eq!(last_page[0].id, ids[0]);

    let result = fx.service.get_all_order_by_views_desc(&PageRequest::of(0, 0)).await;
    assert!(matches!(result, Err(AppError::InvalidArgument { .. })));
}

#[tokio::test]
async fn test_find_all_and_courses_by_tag() {
    let fx = Fixture::new().await;
    let stops = [(fx.destination_ids[0], 1)];
    let t = &fx.tag_ids;

    let night = fx.service.save(&request("Night Out", &stops, &[t[0]])).await.unwrap();
    fx.service.save(&request("Palace Day", &stops, &[t[2]])).await.unwrap();

    assert_eq!(fx.service.find_all().await.unwrap().len(), 2);

    let tagged = fx.service.find_courses_by_tag(t[0]).await.unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].id, night.id);

    assert!(fx.service.find_courses_by_tag(t[1]).await.unwrap().is_empty());
    assert_not_found(fx.service.find_courses_by_tag(9_999).await, Resource::Tag);
}
