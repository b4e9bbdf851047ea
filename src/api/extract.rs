use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::response::Response;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::AppError;
use crate::state::AppState;

use super::envelope::reply;

/// `Path` whose rejection is an `AppError` instead of axum's plain text.
pub struct ApiPath<T>(pub T);

impl<T> FromRequestParts<AppState> for ApiPath<T>
where
    T: DeserializeOwned + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| ApiPath(value))
            .map_err(|rejection: PathRejection| {
                debug!("rejected path: {}", rejection.body_text());
                AppError::validation(format!("Invalid request path: {}", rejection.body_text()))
            })
    }
}

/// `Query` whose rejection is an `AppError` instead of axum's plain text.
pub struct ApiQuery<T>(pub T);

impl<T> FromRequestParts<AppState> for ApiQuery<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| ApiQuery(value))
            .map_err(|rejection: QueryRejection| {
                debug!("rejected query: {}", rejection.body_text());
                AppError::validation(format!("Invalid query parameters: {}", rejection.body_text()))
            })
    }
}

/// Wraps another extractor for mutation endpoints, so its rejection is
/// answered with a `{success: 0}` envelope.
pub struct Enveloped<T>(pub T);

impl<T> FromRequestParts<AppState> for Enveloped<T>
where
    T: FromRequestParts<AppState, Rejection = AppError>,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        T::from_request_parts(parts, state)
            .await
            .map(Enveloped)
            .map_err(|err| reply(Err(err)))
    }
}

/// JSON request body for mutation endpoints. Malformed or mistyped bodies
/// become a 400 `{success: 0}` envelope.
pub struct EnvelopeJson<T>(pub T);

impl<T> FromRequest<AppState> for EnvelopeJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| EnvelopeJson(value))
            .map_err(|rejection: JsonRejection| {
                debug!("rejected body: {}", rejection.body_text());
                let err = AppError::validation(format!("Invalid request body: {}", rejection.body_text()));
                reply(Err(err))
            })
    }
}
