use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

/// Everything a request can be rejected with.
///
/// Signature and token failures share one "unauthorized" surface so a caller
/// cannot distinguish expired from tampered from malformed. Store errors are
/// wrapped whole (including rollback context) but only their generic message
/// ever reaches the wire.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("unauthorized")]
    InvalidSignature,

    #[error("unauthorized")]
    Unauthorized,

    #[error("too many requests")]
    TooManyRequests,

    #[error("username or password is invalid")]
    InvalidCredentials,

    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("user not found")]
    NotFound,

    #[error("internal server error")]
    Store(StoreError),

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    /// Classifies a store failure: unique-constraint collisions become
    /// `Conflict`, everything else stays wrapped for the 500 path.
    pub fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { field } => ApiError::Conflict(field),
            other => ApiError::Store(other),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature
            | ApiError::Unauthorized
            | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            // Detail stays in the log; the caller gets the generic message.
            match &self {
                ApiError::Store(err) => error!(error = %err, "request failed"),
                other => error!(error = %other, "request failed"),
            }
        }
        let body = json!({"status": "error", "message": self.to_string()});
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_taxonomy() {
        assert_eq!(ApiError::InvalidSignature.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::TooManyRequests.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::Conflict("email").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::Internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn signature_and_token_failures_share_one_message() {
        assert_eq!(
            ApiError::InvalidSignature.to_string(),
            ApiError::Unauthorized.to_string()
        );
    }

    #[test]
    fn store_errors_surface_a_generic_message() {
        let err = ApiError::from_store(StoreError::DeadlineExceeded);
        assert_eq!(err.to_string(), "internal server error");
    }

    #[test]
    fn duplicates_classify_as_conflict() {
        let err = ApiError::from_store(StoreError::Duplicate { field: "username" });
        assert!(matches!(err, ApiError::Conflict("username")));
        assert_eq!(err.to_string(), "username already exists");
    }
}
