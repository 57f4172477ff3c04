//! Error responses for the HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sitegrade_core::GradingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Grading(#[from] GradingError),

    #[error("{0}")]
    Validation(String),

    #[error("result '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Grading(GradingError::Validation(_)) | ApiError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Grading(GradingError::UnknownSoil(_)) => StatusCode::BAD_REQUEST,
            ApiError::Grading(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!(status = status.as_u16(), "request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("worker task failed: {err}"))
    }
}
