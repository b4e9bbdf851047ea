use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::db::filter::{CourseFilter, Timeframe};
use crate::db::pagination::Page;
use crate::models::{Course, CourseListing, EnrolledCourse, EnrolledUser, User, ValidCourse};

const COURSE_COLUMNS: &str =
    "c.id, c.title, c.date, c.duration, c.max_attendees, c.description, c.link, c.location";

fn push_page(qb: &mut QueryBuilder<'_, Sqlite>, page: Page) {
    qb.push(" LIMIT ");
    qb.push_bind(page.limit());
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());
}

/// Browse list for one user: every matching course with its enrolled count
/// and whether `user_id` holds an enrollment on it.
pub async fn fetch_course_listings(
    db: &SqlitePool,
    user_id: i64,
    filter: &CourseFilter,
    timeframe: Timeframe,
    today: NaiveDate,
    page: Page,
) -> Result<Vec<CourseListing>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(COURSE_COLUMNS);
    qb.push(", COUNT(e.user_id) AS enrolled, COALESCE(MAX(e.user_id = ");
    qb.push_bind(user_id);
    qb.push("), 0) AS is_user_enrolled FROM courses c LEFT JOIN enrollments e ON e.course_id = c.id");

    filter.push_where(&mut qb, timeframe, today);

    qb.push(" GROUP BY c.id");
    match timeframe {
        Timeframe::Upcoming => qb.push(" ORDER BY c.date ASC, c.id ASC"),
        Timeframe::Past => qb.push(" ORDER BY c.date DESC, c.id DESC"),
    };
    push_page(&mut qb, page);

    qb.build_query_as::<CourseListing>().fetch_all(db).await
}

/// Courses `user_id` is enrolled on, split at `today`, oldest first.
pub async fn fetch_user_enrolments(
    db: &SqlitePool,
    user_id: i64,
    timeframe: Timeframe,
    today: NaiveDate,
    page: Page,
) -> Result<Vec<EnrolledCourse>, sqlx::Error> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT ");
    qb.push(COURSE_COLUMNS);
    qb.push(
        ", (SELECT COUNT(*) FROM enrollments x WHERE x.course_id = c.id) AS enrolled \
         FROM courses c JOIN enrollments e ON e.course_id = c.id WHERE e.user_id = ",
    );
    qb.push_bind(user_id);
    match timeframe {
        Timeframe::Upcoming => qb.push(" AND DATE(c.date) >= "),
        Timeframe::Past => qb.push(" AND DATE(c.date) < "),
    };
    qb.push_bind(today);
    qb.push(" ORDER BY c.date ASC, c.id ASC");
    push_page(&mut qb, page);

    qb.build_query_as::<EnrolledCourse>().fetch_all(db).await
}

pub async fn fetch_enrolled_users(
    db: &SqlitePool,
    course_id: i64,
    page: Page,
) -> Result<Vec<EnrolledUser>, sqlx::Error> {
    sqlx::query_as::<_, EnrolledUser>(
        "SELECT u.id, u.first_name, u.last_name, u.email, u.job_title, e.date_created \
         FROM enrollments e JOIN users u ON u.id = e.user_id \
         WHERE e.course_id = ? \
         ORDER BY e.date_created ASC, e.rowid ASC \
         LIMIT ? OFFSET ?",
    )
    .bind(course_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(db)
    .await
}

pub async fn find_course_by_id(db: &SqlitePool, id: i64) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, title, date, duration, max_attendees, description, link, location FROM courses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_user_by_id(db: &SqlitePool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, first_name, last_name, job_title, is_admin FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn insert_course(db: &SqlitePool, course: &ValidCourse) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO courses (title, date, duration, max_attendees, description, link, location) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&course.title)
    .bind(course.date)
    .bind(course.duration)
    .bind(course.max_attendees)
    .bind(&course.description)
    .bind(&course.link)
    .bind(&course.location)
    .execute(db)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update_course(db: &SqlitePool, id: i64, course: &ValidCourse) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE courses SET title = ?, date = ?, duration = ?, max_attendees = ?, description = ?, link = ?, location = ? WHERE id = ?",
    )
    .bind(&course.title)
    .bind(course.date)
    .bind(course.duration)
    .bind(course.max_attendees)
    .bind(&course.description)
    .bind(&course.link)
    .bind(&course.location)
    .bind(id)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

/// Enrollments on the course are removed by `ON DELETE CASCADE`.
pub async fn delete_course(db: &SqlitePool, id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn count_enrolled(db: &SqlitePool, course_id: i64) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(db)
        .await
}

pub async fn is_enrolled(db: &SqlitePool, user_id: i64, course_id: i64) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM enrollments WHERE user_id = ? AND course_id = ?)",
    )
    .bind(user_id)
    .bind(course_id)
    .fetch_one(db)
    .await
}

pub async fn insert_enrollment(
    db: &SqlitePool,
    user_id: i64,
    course_id: i64,
    date_created: NaiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO enrollments (user_id, course_id, date_created) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(course_id)
        .bind(date_created)
        .execute(db)
        .await?;

    Ok(())
}

/// Inserts the enrollment only if the course exists, is dated `today` or
/// later and has a free seat. Capacity check and insert are a single
/// statement. Returns false when a condition failed; a duplicate still
/// surfaces as a unique violation.
pub async fn insert_enrollment_if_open(
    db: &SqlitePool,
    user_id: i64,
    course_id: i64,
    today: NaiveDate,
    date_created: NaiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO enrollments (user_id, course_id, date_created)
        SELECT ?, c.id, ?
        FROM courses c
        WHERE c.id = ?
          AND DATE(c.date) >= ?
          AND (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id) < c.max_attendees
        "#,
    )
    .bind(user_id)
    .bind(date_created)
    .bind(course_id)
    .bind(today)
    .execute(db)
    .await?
    .rows_affected();

    Ok(result > 0)
}

pub async fn delete_enrollment(db: &SqlitePool, user_id: i64, course_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enrollments WHERE user_id = ? AND course_id = ?")
        .bind(user_id)
        .bind(course_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result > 0)
}

pub async fn delete_user_enrollments(db: &SqlitePool, user_id: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enrollments WHERE user_id = ?")
        .bind(user_id)
        .execute(db)
        .await?
        .rows_affected();

    Ok(result)
}
