use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::time::Duration;
use thiserror::Error;

use crate::feed;

/// Failures surfaced by the HTTP endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Feed(#[from] feed::Error),
    #[error("Request deadline of {}s exceeded", .0.as_secs())]
    DeadlineExceeded(Duration),
}

impl ApiError {
    /// Every failure kind currently maps to 500, including an empty handle.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Feed(_) | ApiError::DeadlineExceeded(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
