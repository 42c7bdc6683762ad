//! API error taxonomy and its wire mapping.
//!
//! Every failure surfaced to a client goes through [`ApiError`]:
//!
//! - `Validation` — structural payload defects, 400, field-level details
//! - `Conflict` — duplicate username/email, 400
//! - `Unauthorized` — missing/invalid/expired token, 401
//! - `BadRequest` — other client errors (wrong credentials, bad old password), 400
//! - `NotFound` — missing *or not-owned* resource, 404
//! - `Internal` — unexpected failure, 500, generic body; detail goes to the log only
//!
//! The not-owned case deliberately shares a response with "truly absent" so a
//! caller can never probe for the existence of another user's data.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::store::StoreError;
use crate::validate::Violation;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed")]
    Validation(Vec<Violation>),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Server error")]
    Internal(#[source] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(details) => {
                json!({"message": "Validation failed", "details": details})
            }
            ApiError::Internal(source) => {
                // Full detail stays server-side; the client gets a generic body.
                tracing::error!(error = %format!("{source:#}"), "request failed");
                json!({"message": "Server error"})
            }
            other => json!({"message": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(msg) => ApiError::Conflict(msg.to_owned()),
            StoreError::NotFound(msg) => ApiError::NotFound(msg.to_owned()),
            StoreError::Sqlite(e) => ApiError::Internal(e.into()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_taxonomy() {
        assert_eq!(
            ApiError::Validation(vec![]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Conflict("Username already exists".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("No token provided".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("Note not found".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err: ApiError = StoreError::Conflict("Email already registered").into();
        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Email already registered");
    }

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ApiError = StoreError::NotFound("Note not found").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
