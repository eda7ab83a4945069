//! Server Error Types
//!
//! Maps handler failures to HTTP responses with a JSON error body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use super::dashboard::DashboardError;

#[derive(Error, Debug)]
pub enum ApiError {
    /// Request payload or parameters rejected
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Dashboard files could not be (re)loaded
    #[error("Dashboard error: {0}")]
    Dashboard(#[from] DashboardError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
    pub request_id: String,
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Dashboard(DashboardError::Parse { .. })
            | ApiError::Dashboard(DashboardError::Invalid(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "DASHBOARD_INVALID")
            }
            ApiError::Dashboard(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DASHBOARD_ERROR"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            ApiError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let request_id = uuid::Uuid::new_v4().to_string();

        if status.is_server_error() {
            tracing::error!(request_id = %request_id, error_code = %code, error_message = %self, "Request failed");
        } else {
            tracing::warn!(request_id = %request_id, error_code = %code, error_message = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
