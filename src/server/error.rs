//! HTTP error responses.
//!
//! Every failing handler returns an [`ApiError`]. A stale version on update
//! becomes a 409 carrying the record as currently stored, so the client can
//! offer to continue from it or to overwrite it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::catalog_store::{FieldError, StoreError, StoreResult, ValidationErrors};

pub const VERSION_CONFLICT_MESSAGE: &str =
    "The record was modified by someone else since it was loaded";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Uniqueness(String),

    #[error("{}", VERSION_CONFLICT_MESSAGE)]
    VersionConflict { current: Value },

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Insufficient permissions")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Builds the conflict response payload from the stored record.
    pub fn version_conflict<E: Serialize>(current: &E) -> Self {
        match serde_json::to_value(current) {
            Ok(current) => ApiError::VersionConflict { current },
            Err(err) => ApiError::Internal(err.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Uniqueness(_) | ApiError::VersionConflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Runs a store operation on the blocking thread pool.
pub async fn blocking<T, F>(operation: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(operation)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?
        .map_err(ApiError::from)
}

#[derive(Serialize)]
struct ValidationBody<'a> {
    error: &'a str,
    details: Vec<FieldError>,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Validation(errors) => ApiError::Validation(errors),
            StoreError::Uniqueness { .. } => ApiError::Uniqueness(err.to_string()),
            StoreError::Internal(err) => ApiError::Internal(err),
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::Validation(errors) => (
                status,
                Json(ValidationBody {
                    error: "Validation failed",
                    details: errors.details(),
                }),
            )
                .into_response(),
            ApiError::VersionConflict { current } => (
                status,
                Json(json!({ "error": VERSION_CONFLICT_MESSAGE, "current": current })),
            )
                .into_response(),
            ApiError::Internal(err) => {
                error!("Internal error while handling request: {:#}", err);
                (status, Json(json!({ "error": "Internal server error" }))).into_response()
            }
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
