use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;

#[derive(Debug)]
pub enum ErrorBody {
    Text(String),
    /// Upstream payload forwarded to the caller unchanged.
    Json(Value),
}

/// API error that converts to a proper HTTP response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn text(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody::Text(message.into()),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::text(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::text(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::text(StatusCode::CONFLICT, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    #[must_use]
    pub fn upstream(body: Value) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody::Json(body),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.body {
            ErrorBody::Text(message) => (self.status, message).into_response(),
            ErrorBody::Json(body) => (self.status, Json(body)).into_response(),
        }
    }
}

/// Extension trait for converting crate results to API errors with a custom
/// message. The underlying error is logged, never returned.
pub trait ResultExt<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError>;
}

impl<T> ResultExt<T> for crate::error::Result<T> {
    fn api_err(self, message: &'static str) -> Result<T, ApiError> {
        self.map_err(|e| {
            tracing::error!("{message}: {e}");
            ApiError::internal(message)
        })
    }
}
