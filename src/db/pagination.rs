//! Lookahead pagination.
//!
//! Every listing fetches one row more than it displays. If that extra row
//! comes back, a next page exists, and no separate `COUNT(*)` is needed.

use serde::Serialize;

use crate::error::AppError;

/// Page size for course and enrolment lists.
pub const COURSE_PAGE_SIZE: i64 = 12;
/// Page size for the users-enrolled-on-a-course list.
pub const ENROLLED_USER_PAGE_SIZE: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    index: i64,
    size: i64,
}

impl Page {
    /// `index` is 1-based. Anything below 1 is rejected before a query runs.
    pub fn new(index: i64, size: i64) -> Result<Self, AppError> {
        if index < 1 {
            return Err(AppError::validation(format!(
                "Page index must be 1 or greater, got {}.",
                index
            )));
        }
        if size < 1 {
            return Err(AppError::validation("Page size must be 1 or greater."));
        }
        Ok(Self { index, size })
    }

    pub fn index(&self) -> i64 {
        self.index
    }

    pub fn size(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        self.size.saturating_mul(self.index - 1)
    }

    /// One more than the page size.
    pub fn limit(&self) -> i64 {
        self.size + 1
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: i64,
    pub page_size: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Paginated<T> {
    /// Folds a lookahead result set (up to `limit()` rows) into a page.
    pub fn from_lookahead(mut rows: Vec<T>, page: Page) -> Self {
        let has_next = rows.len() as i64 > page.size();
        rows.truncate(page.size() as usize);
        Self {
            items: rows,
            page: page.index(),
            page_size: page.size(),
            has_next,
            has_previous: page.index() > 1,
        }
    }
}
