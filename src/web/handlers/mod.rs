// Route handlers for the admin API.

pub mod karma;
pub mod policy;

use axum::http::StatusCode;
use axum::response::Response;

use crate::error::ModerationError;
use crate::web::api_error;

/// Map a moderation error onto an HTTP response.
///
/// Bad input is 422, unreachable storage is 503. Storage detail goes to the
/// log, not the client.
pub fn error_response(err: &ModerationError) -> Response {
    match err {
        ModerationError::InvalidThreshold { .. } | ModerationError::InvalidChannel { .. } => {
            api_error(StatusCode::UNPROCESSABLE_ENTITY, &err.to_string())
        }
        ModerationError::StorageUnavailable(_) => {
            tracing::error!(error = %err, "Admin API storage failure");
            api_error(StatusCode::SERVICE_UNAVAILABLE, "storage unavailable")
        }
        ModerationError::ClassifierUnavailable(_) | ModerationError::DivisionUndefined => {
            tracing::error!(error = %err, "Admin API internal error");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}
