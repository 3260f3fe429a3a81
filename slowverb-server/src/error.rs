//! Error types for slowverb-server
//!
//! Pipeline failures are mapped to HTTP statuses here and nowhere else.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::PipelineError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Pipeline failure before any audio was sent
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(err) => match err {
                PipelineError::EmptyLocator | PipelineError::InvalidLocator { .. } => {
                    StatusCode::BAD_REQUEST
                }
                PipelineError::AcquisitionFailed { .. } => StatusCode::BAD_GATEWAY,
                PipelineError::UnsupportedFormat { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PipelineError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::TransformStartFailed { .. }
                | PipelineError::TransformAbortedMidStream { .. }
                | PipelineError::EncodingFailed { .. }
                | PipelineError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Pipeline(err) => err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
