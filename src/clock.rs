use chrono::{Local, NaiveDate};

/// Source of "today" for upcoming/past classification and date validation.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Server-local calendar date.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always returns the same date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
