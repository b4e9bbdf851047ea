use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%Y/%m/%dT%H:%M:%S",
    "%Y/%m/%dT%H:%M",
];

const INVALID_DATE_MESSAGE: &str = "Provided course date is not valid. Please ensure date is today or later, \
    and that it complies to the following formats: YYYY/MM/dd hh:mm or YYYY/MM/ddThh:mm.";

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub date: NaiveDateTime,
    pub duration: f64,
    pub max_attendees: i64,
    pub description: String,
    pub link: Option<String>,
    pub location: Option<String>,
}

/// A course as seen by one user in the browse lists.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CourseListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub enrolled: i64,
    pub is_user_enrolled: bool,
}

/// A course the user holds an enrollment on.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrolledCourse {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: Course,
    pub enrolled: i64,
}

/// Form fields for creating or editing a course, as submitted.
#[derive(Debug, Clone, Deserialize)]
pub struct CourseRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub max_attendees: i64,
    #[serde(default)]
    pub description: String,
    pub link: Option<String>,
    pub location: Option<String>,
}

/// Course fields that passed validation and may be written.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCourse {
    pub title: String,
    pub date: NaiveDateTime,
    pub duration: f64,
    pub max_attendees: i64,
    pub description: String,
    pub link: Option<String>,
    pub location: Option<String>,
}

impl CourseRequest {
    pub fn validate(&self, today: NaiveDate) -> Result<ValidCourse, AppError> {
        let title = self.title.trim();
        let description = self.description.trim();
        if title.is_empty() || description.is_empty() {
            return Err(AppError::validation(
                "Cannot create a course without required details (title, date, description). Please try again.",
            ));
        }

        let link = non_empty(self.link.as_deref());
        let location = non_empty(self.location.as_deref());
        if link.is_none() && location.is_none() {
            return Err(AppError::validation(
                "A valid course must either have a link, location or both. Please try again.",
            ));
        }

        let raw_date = self.date.trim();
        if raw_date.is_empty() {
            return Err(AppError::validation("You must provide a date."));
        }
        let date = parse_course_date(raw_date)
            .filter(|d| d.date() >= today)
            .ok_or_else(|| AppError::validation(INVALID_DATE_MESSAGE))?;

        // NaN fails this check too.
        if self.max_attendees <= 0 || !(self.duration > 0.0) {
            return Err(AppError::validation(
                "A course cannot have zero max attendees or a duration of zero.",
            ));
        }

        Ok(ValidCourse {
            title: title.to_string(),
            date,
            duration: self.duration,
            max_attendees: self.max_attendees,
            description: description.to_string(),
            link,
            location,
        })
    }
}

/// Parses a course start time. A bare date means midnight.
pub fn parse_course_date(raw: &str) -> Option<NaiveDateTime> {
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
