//! API error type and its JSON response

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use linkshelf_core::ShelfError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Log the underlying failure and hide it behind a generic message
    pub fn internal(message: &str, err: impl std::fmt::Display) -> Self {
        tracing::error!("{}: {}", message, err);
        ApiError::Internal(message.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ShelfError> for ApiError {
    fn from(err: ShelfError) -> Self {
        match err {
            ShelfError::Validation(msg) => ApiError::BadRequest(msg),
            ShelfError::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::internal("Internal server error", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

/// Attach the endpoint's failure message to a store result
pub trait StoreResultExt<T> {
    fn or_fail(self, message: &str) -> ApiResult<T>;
}

impl<T> StoreResultExt<T> for linkshelf_core::Result<T> {
    fn or_fail(self, message: &str) -> ApiResult<T> {
        self.map_err(|err| {
            if err.is_client_error() {
                err.into()
            } else {
                ApiError::internal(message, err)
            }
        })
    }
}

/// Parse a numeric path segment, rejecting anything else before it reaches a store
pub fn parse_id(raw: &str, what: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID")))
}

/// `Option` from a store becomes a 404
pub fn found<T>(value: Option<T>, what: &str) -> ApiResult<T> {
    value.ok_or_else(|| ApiError::NotFound(format!("{what} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ShelfError::validation("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(ShelfError::NotFound("Bookmark".into())).status(),
            StatusCode::NOT_FOUND
        );

        let err = ApiError::from(ShelfError::Database("disk I/O error".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("disk"));
    }

    #[test]
    fn test_or_fail_keeps_client_errors() {
        let failed: linkshelf_core::Result<()> = Err(ShelfError::Storage("lock poisoned".into()));
        let err = failed.or_fail("Failed to fetch bookmarks").unwrap_err();
        assert_eq!(err.to_string(), "Failed to fetch bookmarks");

        let invalid: linkshelf_core::Result<()> = Err(ShelfError::validation("name is empty"));
        let err = invalid.or_fail("Failed to create category").unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42", "bookmark").unwrap(), 42);
        let err = parse_id("abc", "bookmark").unwrap_err();
        assert_eq!(err.to_string(), "Invalid bookmark ID");
    }
}
