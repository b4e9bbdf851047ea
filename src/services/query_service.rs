use std::sync::Arc;

use sqlx::SqlitePool;
use tracing::debug;

use crate::clock::Clock;
use crate::db::filter::{CourseFilter, Timeframe};
use crate::db::pagination::{COURSE_PAGE_SIZE, ENROLLED_USER_PAGE_SIZE, Page, Paginated};
use crate::db::repository;
use crate::error::AppError;
use crate::models::{Course, CourseListing, EnrolledCourse, EnrolledUser};

/// Read side of the course catalogue. Every listing is paginated with a
/// one-row lookahead and classifies courses against `clock.today()`.
pub struct CourseQueryService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CourseQueryService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Courses dated today or later, soonest first.
    pub async fn list_upcoming(
        &self,
        user_id: i64,
        page_index: i64,
        filter: &CourseFilter,
    ) -> Result<Paginated<CourseListing>, AppError> {
        self.list_courses(user_id, page_index, filter, Timeframe::Upcoming).await
    }

    /// Courses dated before today, most recent first.
    pub async fn list_past(
        &self,
        user_id: i64,
        page_index: i64,
        filter: &CourseFilter,
    ) -> Result<Paginated<CourseListing>, AppError> {
        self.list_courses(user_id, page_index, filter, Timeframe::Past).await
    }

    async fn list_courses(
        &self,
        user_id: i64,
        page_index: i64,
        filter: &CourseFilter,
        timeframe: Timeframe,
    ) -> Result<Paginated<CourseListing>, AppError> {
        let page = Page::new(page_index, COURSE_PAGE_SIZE)?;
        let today = self.clock.today();
        debug!("Listing {:?} courses, page {} (today {})", timeframe, page.index(), today);

        let rows = repository::fetch_course_listings(&self.db, user_id, filter, timeframe, today, page).await?;
        Ok(Paginated::from_lookahead(rows, page))
    }

    pub async fn list_enrolled_users(
        &self,
        course_id: i64,
        page_index: i64,
    ) -> Result<Paginated<EnrolledUser>, AppError> {
        let page = Page::new(page_index, ENROLLED_USER_PAGE_SIZE)?;
        let rows = repository::fetch_enrolled_users(&self.db, course_id, page).await?;
        Ok(Paginated::from_lookahead(rows, page))
    }

    pub async fn list_user_upcoming_enrolments(
        &self,
        user_id: i64,
        page_index: i64,
    ) -> Result<Paginated<EnrolledCourse>, AppError> {
        self.list_user_enrolments(user_id, page_index, Timeframe::Upcoming).await
    }

    pub async fn list_user_past_enrolments(
        &self,
        user_id: i64,
        page_index: i64,
    ) -> Result<Paginated<EnrolledCourse>, AppError> {
        self.list_user_enrolments(user_id, page_index, Timeframe::Past).await
    }

    async fn list_user_enrolments(
        &self,
        user_id: i64,
        page_index: i64,
        timeframe: Timeframe,
    ) -> Result<Paginated<EnrolledCourse>, AppError> {
        let page = Page::new(page_index, COURSE_PAGE_SIZE)?;
        let today = self.clock.today();
        let rows = repository::fetch_user_enrolments(&self.db, user_id, timeframe, today, page).await?;
        Ok(Paginated::from_lookahead(rows, page))
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Course, AppError> {
        repository::find_course_by_id(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)
    }
}
