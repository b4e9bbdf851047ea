use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use enrolr::clock::FixedClock;
use enrolr::db::filter::CourseFilter;
use enrolr::db::pagination::COURSE_PAGE_SIZE;
use enrolr::db::repository;
use enrolr::error::AppError;
use enrolr::models::{Caller, CourseRequest, ValidCourse};
use enrolr::services::{CourseMutationService, CourseQueryService};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

struct Fixture {
    db: SqlitePool,
    queries: CourseQueryService,
    mutations: CourseMutationService,
    admin: Caller,
    alice: Caller,
    bob: Caller,
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2030, 1, 10).unwrap()
}

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2030, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

async fn add_user(db: &SqlitePool, email: &str, is_admin: bool) -> i64 {
    sqlx::query("INSERT INTO users (email, first_name, last_name, job_title, is_admin) VALUES (?, 'Test', 'User', 'Porter', ?)")
        .bind(email)
        .bind(is_admin)
        .execute(db)
        .await
        .expect("Failed to insert user")
        .last_insert_rowid()
}

async fn setup() -> Fixture {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");

    let admin = Caller::admin(add_user(&db, "admin@example.com", true).await);
    let alice = Caller::staff(add_user(&db, "alice@example.com", false).await);
    let bob = Caller::staff(add_user(&db, "bob@example.com", false).await);

    let clock = Arc::new(FixedClock(today()));
    Fixture {
        queries: CourseQueryService::new(db.clone(), clock.clone()),
        mutations: CourseMutationService::new(db.clone(), clock),
        db,
        admin,
        alice,
        bob,
    }
}

fn request(date: &str) -> CourseRequest {
    CourseRequest {
        title: "Manual Handling".to_string(),
        date: date.to_string(),
        duration: 2.0,
        max_attendees: 10,
        description: "Lifting safely".to_string(),
        link: None,
        location: Some("Training Room".to_string()),
    }
}

async fn past_course(db: &SqlitePool, date: NaiveDateTime) -> i64 {
    let course = ValidCourse {
        title: "Old course".to_string(),
        date,
        duration: 1.0,
        max_attendees: 10,
        description: "Already happened".to_string(),
        link: Some("https://example.com/recording".to_string()),
        location: None,
    };
    repository::insert_course(db, &course).await.expect("Failed to insert course")
}

#[tokio::test]
async fn test_create_requires_link_or_location() {
    let f = setup().await;

    let mut req = request("2030-01-12 10:00");
    req.location = Some(String::new());
    req.link = Some(String::new());
    let err = f.mutations.create_course(&f.admin, &req).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    req.link = Some("https://meet.example.com/x".to_string());
    let id = f.mutations.create_course(&f.admin, &req).await.expect("create should succeed");
    let course = f.queries.get_course(id).await.unwrap();
    assert_eq!(course.link.as_deref(), Some("https://meet.example.com/x"));
    assert_eq!(course.location, None);
}

#[tokio::test]
async fn test_create_date_must_be_today_or_later() {
    let f = setup().await;

    let err = f
        .mutations
        .create_course(&f.admin, &request("2030-01-09 23:00"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Today with a time that has already gone is still accepted.
    assert!(f.mutations.create_course(&f.admin, &request("2030-01-10 00:30")).await.is_ok());
}

#[tokio::test]
async fn test_validation_failure_writes_nothing() {
    let f = setup().await;

    let mut req = request("2030-01-12 10:00");
    req.max_attendees = 0;
    assert!(f.mutations.create_course(&f.admin, &req).await.is_err());

    let page = f.queries.list_upcoming(f.alice.user_id, 1, &CourseFilter::default()).await.unwrap();
    assert!(page.items.is_empty());
}

#[tokio::test]
async fn test_only_admin_manages_courses() {
    let f = setup().await;

    let err = f.mutations.create_course(&f.alice, &request("2030-01-12 10:00")).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();
    assert!(matches!(f.mutations.delete_course(&f.bob, id).await, Err(AppError::Forbidden(_))));
    assert!(matches!(
        f.mutations.edit_course(&f.bob, id, &request("2030-01-13 10:00")).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_edit_course() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();

    let mut req = request("2030-01-15T14:30");
    req.title = "Manual Handling (Advanced)".to_string();
    f.mutations.edit_course(&f.admin, id, &req).await.unwrap();

    let course = f.queries.get_course(id).await.unwrap();
    assert_eq!(course.title, "Manual Handling (Advanced)");
    assert_eq!(course.date, NaiveDate::from_ymd_opt(2030, 1, 15).unwrap().and_hms_opt(14, 30, 0).unwrap());

    assert!(matches!(
        f.mutations.edit_course(&f.admin, id + 100, &req).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn test_invalid_edit_leaves_course_unchanged() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();

    let mut req = request("2030-01-15 10:00");
    req.title = "Renamed".to_string();
    req.max_attendees = 0;
    assert!(matches!(f.mutations.edit_course(&f.admin, id, &req).await, Err(AppError::Validation(_))));

    let mut req = request("2030-01-01 10:00");
    req.title = "Renamed".to_string();
    assert!(matches!(f.mutations.edit_course(&f.admin, id, &req).await, Err(AppError::Validation(_))));

    let course = f.queries.get_course(id).await.unwrap();
    assert_eq!(course.title, "Manual Handling");
    assert_eq!(course.date, at(12, 10));
    assert_eq!(course.max_attendees, 10);
}

#[tokio::test]
async fn test_enroll_then_unenroll_round_trip() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();

    f.mutations.enroll(&f.alice, id).await.unwrap();
    f.mutations.enroll(&f.bob, id).await.unwrap();

    let users = f.queries.list_enrolled_users(id, 1).await.unwrap();
    assert_eq!(users.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![f.alice.user_id, f.bob.user_id]);

    f.mutations.unenroll(&f.alice, id).await.unwrap();

    let users = f.queries.list_enrolled_users(id, 1).await.unwrap();
    assert_eq!(users.items.iter().map(|u| u.id).collect::<Vec<_>>(), vec![f.bob.user_id]);

    assert!(matches!(f.mutations.unenroll(&f.alice, id).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_enroll_rules() {
    let f = setup().await;
    let mut req = request("2030-01-12 10:00");
    req.max_attendees = 1;
    let id = f.mutations.create_course(&f.admin, &req).await.unwrap();

    assert!(matches!(f.mutations.enroll(&f.admin, id).await, Err(AppError::Forbidden(_))));
    assert!(matches!(f.mutations.enroll(&f.alice, id + 100).await, Err(AppError::NotFound)));

    f.mutations.enroll(&f.alice, id).await.unwrap();
    assert!(matches!(f.mutations.enroll(&f.bob, id).await, Err(AppError::Validation(_))));

    // Already holding the only seat reads as a duplicate, not as full.
    assert!(matches!(f.mutations.enroll(&f.alice, id).await, Err(AppError::Conflict(_))));

    let old = past_course(&f.db, at(2, 9)).await;
    assert!(matches!(f.mutations.enroll(&f.alice, old).await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_admin_cannot_unenroll() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();
    f.mutations.enroll(&f.alice, id).await.unwrap();

    assert!(matches!(f.mutations.unenroll(&f.admin, id).await, Err(AppError::Forbidden(_))));
    assert!(matches!(f.mutations.unenroll_all(&f.admin).await, Err(AppError::Forbidden(_))));
    assert_eq!(f.queries.list_enrolled_users(id, 1).await.unwrap().items.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enrolls_fill_last_seat_once() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let options = SqliteConnectOptions::new()
        .filename(dir.path().join("enrolr.db"))
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await
        .expect("Failed to create database");

    sqlx::migrate!("./migrations")
        .run(&db)
        .await
        .expect("Failed to run migrations");

    let admin = Caller::admin(add_user(&db, "admin@example.com", true).await);
    let mut staff = Vec::new();
    for n in 0..8 {
        staff.push(Caller::staff(add_user(&db, &format!("staff{}@example.com", n), false).await));
    }

    let mutations = Arc::new(CourseMutationService::new(db.clone(), Arc::new(FixedClock(today()))));
    let mut req = request("2030-01-12 10:00");
    req.max_attendees = 1;
    let id = mutations.create_course(&admin, &req).await.unwrap();

    let handles: Vec<_> = staff
        .into_iter()
        .map(|caller| {
            let mutations = mutations.clone();
            tokio::spawn(async move { mutations.enroll(&caller, id).await })
        })
        .collect();

    let mut enrolled = 0;
    for handle in handles {
        match handle.await.expect("enroll task panicked") {
            Ok(()) => enrolled += 1,
            Err(AppError::Validation(msg)) => assert_eq!(msg, "This course is fully booked."),
            Err(other) => panic!("unexpected enroll error: {:?}", other),
        }
    }

    assert_eq!(enrolled, 1);
    assert_eq!(repository::count_enrolled(&db, id).await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_enroll_is_conflict() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();

    f.mutations.enroll(&f.alice, id).await.unwrap();
    assert!(matches!(f.mutations.enroll(&f.alice, id).await, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_delete_course_removes_listing_and_enrollments() {
    let f = setup().await;
    let keep = f.mutations.create_course(&f.admin, &request("2030-01-11 10:00")).await.unwrap();
    let gone = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();
    f.mutations.enroll(&f.alice, gone).await.unwrap();

    f.mutations.delete_course(&f.admin, gone).await.unwrap();

    let page = f.queries.list_upcoming(f.alice.user_id, 1, &CourseFilter::default()).await.unwrap();
    assert_eq!(page.items.iter().map(|c| c.course.id).collect::<Vec<_>>(), vec![keep]);
    assert!(f.queries.list_enrolled_users(gone, 1).await.unwrap().items.is_empty());
    assert!(matches!(f.queries.get_course(gone).await, Err(AppError::NotFound)));
    assert!(matches!(f.mutations.delete_course(&f.admin, gone).await, Err(AppError::NotFound)));
}

#[tokio::test]
async fn test_upcoming_pagination_is_stable() {
    let f = setup().await;
    for i in 0..30u32 {
        let date = format!("2030-01-{:02} {:02}:00", 10 + (i % 7), 8 + (i % 3));
        f.mutations.create_course(&f.admin, &request(&date)).await.unwrap();
    }

    let mut seen = Vec::new();
    let mut last_date: Option<NaiveDateTime> = None;
    for page_index in 1..=3 {
        let page = f
            .queries
            .list_upcoming(f.alice.user_id, page_index, &CourseFilter::default())
            .await
            .unwrap();
        assert!(page.items.len() as i64 <= COURSE_PAGE_SIZE);
        assert_eq!(page.has_next, page_index < 3);
        assert_eq!(page.has_previous, page_index > 1);

        if let (Some(prev), Some(first)) = (last_date, page.items.first()) {
            assert!(first.course.date >= prev);
        }
        last_date = page.items.last().map(|c| c.course.date);
        seen.extend(page.items.iter().map(|c| c.course.id));
    }

    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 30);
}

#[tokio::test]
async fn test_page_index_zero_fails_fast() {
    let f = setup().await;
    let err = f
        .queries
        .list_upcoming(f.alice.user_id, 0, &CourseFilter::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(matches!(f.queries.list_enrolled_users(1, 0).await, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_same_day_course_stays_upcoming() {
    let f = setup().await;
    let started = f.mutations.create_course(&f.admin, &request("2030-01-10 00:15")).await.unwrap();
    let old = past_course(&f.db, at(9, 18)).await;

    let upcoming = f.queries.list_upcoming(f.alice.user_id, 1, &CourseFilter::default()).await.unwrap();
    let past = f.queries.list_past(f.alice.user_id, 1, &CourseFilter::default()).await.unwrap();

    assert_eq!(upcoming.items.iter().map(|c| c.course.id).collect::<Vec<_>>(), vec![started]);
    assert_eq!(past.items.iter().map(|c| c.course.id).collect::<Vec<_>>(), vec![old]);
}

#[tokio::test]
async fn test_user_enrolments_and_unenroll_all() {
    let f = setup().await;
    let soon = f.mutations.create_course(&f.admin, &request("2030-01-11 10:00")).await.unwrap();
    let later = f.mutations.create_course(&f.admin, &request("2030-01-20 10:00")).await.unwrap();
    f.mutations.enroll(&f.alice, later).await.unwrap();
    f.mutations.enroll(&f.alice, soon).await.unwrap();
    f.mutations.enroll(&f.bob, later).await.unwrap();

    let old = past_course(&f.db, at(3, 9)).await;
    repository::insert_enrollment(&f.db, f.alice.user_id, old, at(1, 9)).await.unwrap();

    let upcoming = f.queries.list_user_upcoming_enrolments(f.alice.user_id, 1).await.unwrap();
    assert_eq!(upcoming.items.iter().map(|c| c.course.id).collect::<Vec<_>>(), vec![soon, later]);
    assert_eq!(upcoming.items[1].enrolled, 2);

    let past = f.queries.list_user_past_enrolments(f.alice.user_id, 1).await.unwrap();
    assert_eq!(past.items.iter().map(|c| c.course.id).collect::<Vec<_>>(), vec![old]);

    assert!(matches!(f.mutations.unenroll_all(&f.admin).await, Err(AppError::Forbidden(_))));
    assert_eq!(f.mutations.unenroll_all(&f.alice).await.unwrap(), 3);
    assert!(f.queries.list_user_upcoming_enrolments(f.alice.user_id, 1).await.unwrap().items.is_empty());
    assert_eq!(f.queries.list_enrolled_users(later, 1).await.unwrap().items.len(), 1);
}

#[tokio::test]
async fn test_admin_removes_enrollment() {
    let f = setup().await;
    let id = f.mutations.create_course(&f.admin, &request("2030-01-12 10:00")).await.unwrap();
    f.mutations.enroll(&f.alice, id).await.unwrap();

    assert!(matches!(
        f.mutations.remove_enrollment(&f.bob, id, f.alice.user_id).await,
        Err(AppError::Forbidden(_))
    ));
    f.mutations.remove_enrollment(&f.admin, id, f.alice.user_id).await.unwrap();
    assert!(matches!(
        f.mutations.remove_enrollment(&f.admin, id, f.alice.user_id).await,
        Err(AppError::NotFound)
    ));
}
