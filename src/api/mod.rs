pub mod caller;
pub mod envelope;
pub mod extract;

use axum::Json;
use axum::response::Response;
use axum::routing::{delete, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;

use crate::db::filter::CourseFilter;
use crate::db::pagination::Paginated;
use crate::error::AppError;
use crate::models::*;
use crate::state::AppState;

use self::envelope::{Envelope, reply};
use self::extract::{ApiPath, ApiQuery, EnvelopeJson, Enveloped};

#[derive(Deserialize)]
struct CourseSearchParams {
    #[serde(default = "first_page")]
    page: i64,
    min_date: Option<String>,
    max_date: Option<String>,
    title: Option<String>,
}

impl CourseSearchParams {
    fn filter(&self) -> Result<CourseFilter, AppError> {
        CourseFilter::from_params(
            self.min_date.as_deref(),
            self.max_date.as_deref(),
            self.title.as_deref(),
        )
    }
}

#[derive(Deserialize)]
struct PageParams {
    #[serde(default = "first_page")]
    page: i64,
}

fn first_page() -> i64 {
    1
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", post(create_course))
        .route("/courses/upcoming", get(list_upcoming))
        .route("/courses/past", get(list_past))
        .route("/courses/{id}", get(get_course).put(edit_course).delete(delete_course))
        .route("/courses/{id}/enrolled", get(list_enrolled_users))
        .route("/courses/{id}/enrolled/{user_id}", delete(remove_enrollment))
        .route("/courses/{id}/enroll", post(enroll))
        .route("/courses/{id}/unenroll", post(unenroll))
        .route("/enrolments", delete(unenroll_all))
        .route("/enrolments/upcoming", get(list_upcoming_enrolments))
        .route("/enrolments/past", get(list_past_enrolments))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn list_upcoming(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<CourseSearchParams>,
) -> Result<Json<Paginated<CourseListing>>, AppError> {
    let filter = params.filter()?;
    let page = state.queries().list_upcoming(caller.user_id, params.page, &filter).await?;
    Ok(Json(page))
}

async fn list_past(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<CourseSearchParams>,
) -> Result<Json<Paginated<CourseListing>>, AppError> {
    let filter = params.filter()?;
    let page = state.queries().list_past(caller.user_id, params.page, &filter).await?;
    Ok(Json(page))
}

async fn get_course(
    State(state): State<AppState>,
    _caller: Caller,
    ApiPath(id): ApiPath<i64>,
) -> Result<Json<Course>, AppError> {
    let course = state.queries().get_course(id).await?;
    Ok(Json(course))
}

/// Enrolled users carry contact details, so the list is admin-only.
async fn list_enrolled_users(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<i64>,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Paginated<EnrolledUser>>, AppError> {
    caller.require_admin()?;
    let page = state.queries().list_enrolled_users(id, params.page).await?;
    Ok(Json(page))
}

async fn list_upcoming_enrolments(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Paginated<EnrolledCourse>>, AppError> {
    let page = state
        .queries()
        .list_user_upcoming_enrolments(caller.user_id, params.page)
        .await?;
    Ok(Json(page))
}

async fn list_past_enrolments(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<PageParams>,
) -> Result<Json<Paginated<EnrolledCourse>>, AppError> {
    let page = state
        .queries()
        .list_user_past_enrolments(caller.user_id, params.page)
        .await?;
    Ok(Json(page))
}

async fn create_course(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    EnvelopeJson(req): EnvelopeJson<CourseRequest>,
) -> Response {
    let result = state.mutations().create_course(&caller, &req).await;
    reply(result.map(|id| Envelope::created(id, "Course created successfully.")))
}

async fn edit_course(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    Enveloped(ApiPath(id)): Enveloped<ApiPath<i64>>,
    EnvelopeJson(req): EnvelopeJson<CourseRequest>,
) -> Response {
    let result = state.mutations().edit_course(&caller, id, &req).await;
    reply(result.map(|_| Envelope::ok("Course updated successfully.")))
}

async fn delete_course(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    Enveloped(ApiPath(id)): Enveloped<ApiPath<i64>>,
) -> Response {
    let result = state.mutations().delete_course(&caller, id).await;
    reply(result.map(|_| Envelope::ok("Course deleted successfully.")))
}

async fn enroll(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    Enveloped(ApiPath(id)): Enveloped<ApiPath<i64>>,
) -> Response {
    let result = state.mutations().enroll(&caller, id).await;
    reply(result.map(|_| Envelope::ok("Successfully enrolled on course.")))
}

async fn unenroll(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    Enveloped(ApiPath(id)): Enveloped<ApiPath<i64>>,
) -> Response {
    let result = state.mutations().unenroll(&caller, id).await;
    reply(result.map(|_| Envelope::ok("Successfully unenrolled from course.")))
}

async fn remove_enrollment(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
    Enveloped(ApiPath((id, user_id))): Enveloped<ApiPath<(i64, i64)>>,
) -> Response {
    let result = state.mutations().remove_enrollment(&caller, id, user_id).await;
    reply(result.map(|_| Envelope::ok("User removed from course.")))
}

async fn unenroll_all(
    State(state): State<AppState>,
    Enveloped(caller): Enveloped<Caller>,
) -> Response {
    let result = state.mutations().unenroll_all(&caller).await;
    reply(result.map(|removed| Envelope::ok(format!("Deleted {} enrolments.", removed))))
}
