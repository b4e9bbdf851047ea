use axum::{Json, http::StatusCode, response::{IntoResponse, Response}};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Not found")]
    NotFound,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Migrate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the end user. Storage failures are logged
    /// here and replaced by a generic text.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound => "The requested course or enrolment could not be found.".to_string(),
            AppError::Validation(msg) | AppError::Forbidden(msg) | AppError::Conflict(msg) => msg.clone(),
            AppError::Unauthorized => "You are not authorised to perform this action".to_string(),
            AppError::Database(e) => {
                error!("database error: {}", e);
                "Database error occurred".to_string()
            }
            AppError::Migrate(e) => {
                error!("migration error: {}", e);
                "Internal server error".to_string()
            }
        }
    }
}

/// Maps a unique-constraint violation onto `Conflict`, leaving any other
/// storage error as `Database`.
pub fn conflict_on_unique(err: sqlx::Error, msg: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(msg.to_string())
        }
        _ => AppError::Database(err),
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorResponse {
            error: status.to_string(),
            message: self.user_message(),
        });

        (status, body).into_response()
    }
}
