//! WHERE-clause construction for the course browse lists.

use chrono::NaiveDate;
use sqlx::{QueryBuilder, Sqlite};

use crate::error::AppError;

/// Which side of today a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    /// Courses on or after the lower bound (today by default).
    Upcoming,
    /// Courses strictly before the upper bound (today by default).
    Past,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseFilter {
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    pub title: Option<String>,
}

impl CourseFilter {
    /// Builds a filter from raw search fields. Empty or blank fields count as
    /// absent, dates must be `YYYY-MM-DD`.
    pub fn from_params(
        min_date: Option<&str>,
        max_date: Option<&str>,
        title: Option<&str>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            min_date: parse_search_date(min_date)?,
            max_date: parse_search_date(max_date)?,
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    /// Appends ` WHERE ...` for the given timeframe. Every value goes through
    /// `push_bind`.
    pub fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>, timeframe: Timeframe, today: NaiveDate) {
        match timeframe {
            Timeframe::Upcoming => {
                qb.push(" WHERE DATE(c.date) >= ");
                qb.push_bind(self.min_date.unwrap_or(today));
                if let Some(max) = self.max_date {
                    qb.push(" AND DATE(c.date) <= ");
                    qb.push_bind(max);
                }
            }
            Timeframe::Past => {
                qb.push(" WHERE DATE(c.date) < ");
                qb.push_bind(self.max_date.unwrap_or(today));
                if let Some(min) = self.min_date {
                    qb.push(" AND DATE(c.date) >= ");
                    qb.push_bind(min);
                }
            }
        }

        if let Some(title) = &self.title {
            // SQLite LIKE folds ASCII letters only; LOWER() has the same limit.
            qb.push(" AND c.title LIKE '%' || ");
            qb.push_bind(escape_like(title));
            qb.push(" || '%' ESCAPE '\\'");
        }
    }
}

fn parse_search_date(raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim).filter(|d| !d.is_empty()) {
        None => Ok(None),
        Some(d) => NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::validation(format!("Search date '{}' is not a valid YYYY-MM-DD date.", d))),
    }
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
