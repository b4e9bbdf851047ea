use std::sync::Arc;

use sqlx::SqlitePool;

use crate::clock::Clock;
use crate::services::{CourseMutationService, CourseQueryService};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn queries(&self) -> CourseQueryService {
        CourseQueryService::new(self.db.clone(), self.clock.clone())
    }

    pub fn mutations(&self) -> CourseMutationService {
        CourseMutationService::new(self.db.clone(), self.clock.clone())
    }
}
