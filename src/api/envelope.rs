use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;

use crate::error::AppError;

/// `{success, message}` body returned by every mutation endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl Envelope {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: 1, message: message.into(), id: None }
    }

    pub fn created(id: i64, message: impl Into<String>) -> Self {
        Self { success: 1, message: message.into(), id: Some(id) }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self { success: 0, message: message.into(), id: None }
    }
}

pub fn reply(result: Result<Envelope, AppError>) -> Response {
    match result {
        Ok(envelope) => (StatusCode::OK, Json(envelope)).into_response(),
        Err(err) => (err.status(), Json(Envelope::failure(err.user_message()))).into_response(),
    }
}
