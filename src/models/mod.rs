pub mod course;
pub mod user;

pub use course::{Course, CourseListing, CourseRequest, EnrolledCourse, ValidCourse};
pub use user::{Caller, EnrolledUser, User};
