//! Error types for cdd-service
//!
//! [`DictionaryError`] is the only error type that reaches HTTP handlers.
//! Upstream transport failures are converted at the cache boundary and never
//! surface here directly.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Dictionary service error
#[derive(Debug, Error)]
pub enum DictionaryError {
    /// Published snapshot is invalid (503)
    #[error("Clinical attribute metadata source unavailable")]
    MetadataSourceUnresponsive,

    /// An explicit refresh could not produce a valid snapshot (503)
    #[error("Failed to refresh metadata cache")]
    FailedCacheRefresh,

    /// One or more requested column headers are unknown (404)
    #[error("Clinical attribute(s) not found: {}", .0.join(", "))]
    AttributeNotFound(Vec<String>),

    /// Unknown override policy / cancer study (404)
    #[error("Override policy not found: {0}")]
    PolicyNotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl DictionaryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DictionaryError::MetadataSourceUnresponsive | DictionaryError::FailedCacheRefresh => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            DictionaryError::AttributeNotFound(_) | DictionaryError::PolicyNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            DictionaryError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            DictionaryError::MetadataSourceUnresponsive => "METADATA_SOURCE_UNRESPONSIVE",
            DictionaryError::FailedCacheRefresh => "FAILED_CACHE_REFRESH",
            DictionaryError::AttributeNotFound(_) => "ATTRIBUTE_NOT_FOUND",
            DictionaryError::PolicyNotFound(_) => "POLICY_NOT_FOUND",
            DictionaryError::BadRequest(_) => "BAD_REQUEST",
        }
    }
}

impl IntoResponse for DictionaryError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let mut error = json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        if let DictionaryError::AttributeNotFound(headers) = &self {
            error["column_headers"] = json!(headers);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

impl From<JsonRejection> for DictionaryError {
    fn from(rejection: JsonRejection) -> Self {
        DictionaryError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for DictionaryError {
    fn from(rejection: QueryRejection) -> Self {
        DictionaryError::BadRequest(rejection.body_text())
    }
}

/// Result type for dictionary operations and API handlers
pub type DictionaryResult<T> = Result<T, DictionaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            DictionaryError::MetadataSourceUnresponsive.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            DictionaryError::FailedCacheRefresh.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            DictionaryError::AttributeNotFound(vec!["X".into()]).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DictionaryError::PolicyNotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            DictionaryError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_not_found_message_lists_every_header() {
        let err = DictionaryError::AttributeNotFound(vec!["FOO".into(), "BAR".into()]);
        assert_eq!(err.to_string(), "Clinical attribute(s) not found: FOO, BAR");
    }
}
