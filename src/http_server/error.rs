//! Defines the custom `ApiError` type for the HTTP server.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::persistence::error::PersistenceError;

/// A custom error type for the API that can be converted into an HTTP response.
#[derive(Debug)]
pub enum ApiError {
    /// Represents an unauthorized request.
    Unauthorized,

    /// Represents a resource that could not be found.
    NotFound(String),

    /// Represents a generic internal server error.
    InternalServerError(String),
}

/// Converts a `PersistenceError` into an `ApiError`, so handlers can use `?`
/// on store calls.
impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound(message) => ApiError::NotFound(message),
            _ => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            ApiError::Unauthorized =>
                (StatusCode::UNAUTHORIZED, json!({ "error": "Unauthorized" })),
            ApiError::InternalServerError(err) => {
                tracing::error!("Internal server error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal server error occurred" }),
                )
            }
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, json!({ "error": message })),
        };

        (status, Json(body)).into_response()
    }
}
