use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::db::repository;
use crate::error::{AppError, conflict_on_unique};
use crate::models::{Caller, CourseRequest};

const ALREADY_ENROLLED: &str = "You are already enrolled on this course.";

/// Write side: course administration and self-service enrollment.
/// Validation happens before any statement runs.
pub struct CourseMutationService {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl CourseMutationService {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    pub async fn create_course(&self, caller: &Caller, req: &CourseRequest) -> Result<i64, AppError> {
        caller.require_admin()?;
        let course = req.validate(self.clock.today())?;

        let id = repository::insert_course(&self.db, &course).await?;
        info!("Course {} created by user {}: {}", id, caller.user_id, course.title);
        Ok(id)
    }

    pub async fn edit_course(&self, caller: &Caller, course_id: i64, req: &CourseRequest) -> Result<(), AppError> {
        caller.require_admin()?;
        let course = req.validate(self.clock.today())?;

        if !repository::update_course(&self.db, course_id, &course).await? {
            return Err(AppError::NotFound);
        }
        info!("Course {} edited by user {}", course_id, caller.user_id);
        Ok(())
    }

    pub async fn delete_course(&self, caller: &Caller, course_id: i64) -> Result<(), AppError> {
        caller.require_admin()?;

        if !repository::delete_course(&self.db, course_id).await? {
            return Err(AppError::NotFound);
        }
        info!("Course {} deleted by user {}", course_id, caller.user_id);
        Ok(())
    }

    /// Enrolls the caller on a course that exists, has not passed and still
    /// has room. The seat is claimed by one conditional insert; when it
    /// inserts nothing the course is read again to say why.
    pub async fn enroll(&self, caller: &Caller, course_id: i64) -> Result<(), AppError> {
        caller.require_staff()?;
        let today = self.clock.today();

        let inserted = repository::insert_enrollment_if_open(
            &self.db,
            caller.user_id,
            course_id,
            today,
            Utc::now().naive_utc(),
        )
        .await
        .map_err(|e| conflict_on_unique(e, ALREADY_ENROLLED))?;

        if !inserted {
            return Err(self.enroll_refusal(caller.user_id, course_id, today).await?);
        }
        info!("User {} enrolled on course {}", caller.user_id, course_id);
        Ok(())
    }

    async fn enroll_refusal(&self, user_id: i64, course_id: i64, today: NaiveDate) -> Result<AppError, AppError> {
        let Some(course) = repository::find_course_by_id(&self.db, course_id).await? else {
            return Ok(AppError::NotFound);
        };

        if course.date.date() < today {
            return Ok(AppError::validation("This course has already taken place."));
        }
        if repository::is_enrolled(&self.db, user_id, course_id).await? {
            return Ok(AppError::Conflict(ALREADY_ENROLLED.to_string()));
        }

        let enrolled = repository::count_enrolled(&self.db, course_id).await?;
        if enrolled >= course.max_attendees {
            warn!("User {} tried to enrol on full course {}", user_id, course_id);
            return Ok(AppError::validation("This course is fully booked."));
        }

        // A seat was freed between the insert and this read.
        Ok(AppError::Conflict("The course changed while enrolling. Please try again.".to_string()))
    }

    pub async fn unenroll(&self, caller: &Caller, course_id: i64) -> Result<(), AppError> {
        caller.require_staff()?;

        if !repository::delete_enrollment(&self.db, caller.user_id, course_id).await? {
            return Err(AppError::NotFound);
        }
        info!("User {} unenrolled from course {}", caller.user_id, course_id);
        Ok(())
    }

    /// Admin removal of another user's enrollment.
    pub async fn remove_enrollment(&self, caller: &Caller, course_id: i64, user_id: i64) -> Result<(), AppError> {
        caller.require_admin()?;

        if !repository::delete_enrollment(&self.db, user_id, course_id).await? {
            return Err(AppError::NotFound);
        }
        info!("User {} removed from course {} by admin {}", user_id, course_id, caller.user_id);
        Ok(())
    }

    /// Drops every enrollment the caller holds. Returns how many were removed.
    pub async fn unenroll_all(&self, caller: &Caller) -> Result<u64, AppError> {
        caller.require_staff()?;

        let removed = repository::delete_user_enrollments(&self.db, caller.user_id).await?;
        info!("User {} removed all {} enrolments", caller.user_id, removed);
        Ok(removed)
    }
}
