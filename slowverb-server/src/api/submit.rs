//! Submission endpoints
//!
//! `POST /submit` runs one locator through the pipeline and streams the
//! processed audio back as an attachment.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const WELCOME_MESSAGE: &str = "Welcome to the slowverb server!";

/// Body of `POST /submit`
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Media locator handed to the retrieval tool
    #[serde(default, alias = "locator")]
    pub youtube_link: String,
}

/// GET /
pub async fn welcome() -> &'static str {
    WELCOME_MESSAGE
}

/// POST /submit
///
/// The body is parsed regardless of `Content-Type`. Failures before the first
/// audio byte become JSON errors; a failure after that can only truncate the
/// body, since the status line is already sent.
pub async fn submit(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let request: SubmitRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid JSON: {}", e)))?;

    let processed = state
        .orchestrator
        .process_locator(&request.youtube_link)
        .await?;

    let headers = [
        (header::CONTENT_TYPE, processed.content_type().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename={}", processed.file_name()),
        ),
    ];

    Ok((StatusCode::OK, headers, Body::from_stream(processed)).into_response())
}

/// Build submission routes
pub fn submit_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(welcome))
        .route("/submit", post(submit))
}
