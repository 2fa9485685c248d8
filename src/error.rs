use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request is well-formed but the current booking or driver state forbids it.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Nothing is available right now; callers retry later.
    #[error("no eligible driver available")]
    NoEligibleDriver,

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short label used for metrics and sweep reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::PreconditionViolation(_) => "precondition",
            AppError::NoEligibleDriver => "no_driver",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::Internal(_) => "error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::PreconditionViolation(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::NoEligibleDriver => (
                StatusCode::SERVICE_UNAVAILABLE,
                "no eligible driver available".to_string(),
            ),
            AppError::PermissionDenied(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
