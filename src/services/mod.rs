pub mod mutation_service;
pub mod query_service;

pub use mutation_service::CourseMutationService;
pub use query_service::CourseQueryService;
