use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use tracing::debug;

use crate::db::repository;
use crate::error::AppError;
use crate::models::Caller;
use crate::state::AppState;

/// Header set by the session layer in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .ok_or(AppError::Unauthorized)?;

        // The admin flag always comes from storage, never from the request.
        let user = repository::find_user_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| {
                debug!("unknown user id {} in request", user_id);
                AppError::Unauthorized
            })?;

        Ok(Caller::from(&user))
    }
}
