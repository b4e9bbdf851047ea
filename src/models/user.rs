use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;

use crate::error::AppError;

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub job_title: String,
    pub is_admin: bool,
}

/// The authenticated user an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub is_admin: bool,
}

impl Caller {
    pub fn staff(user_id: i64) -> Self {
        Self { user_id, is_admin: false }
    }

    pub fn admin(user_id: i64) -> Self {
        Self { user_id, is_admin: true }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Only administrators can manage courses.".to_string(),
            ))
        }
    }

    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_admin {
            Err(AppError::Forbidden(
                "Admins are not able to enrol on courses, so therefore do not need access to enrolments."
                    .to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl From<&User> for Caller {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            is_admin: user.is_admin,
        }
    }
}

/// A user enrolled on a course, with the time they enrolled.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrolledUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub job_title: String,
    pub date_created: NaiveDateTime,
}
