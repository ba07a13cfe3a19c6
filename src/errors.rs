//! Error types.
//!
//! [`MetaError`] is what the metadata synchronizer reports to its caller.
//! [`ApiError`] is what LFS clients see; it implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(ApiError::NotFound)`.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// Failures talking to the authoritative metadata API.
#[derive(Debug, Error)]
pub enum MetaError {
    /// Network or connection failure. Never retried.
    #[error("metadata API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not a valid metadata record.
    #[error("malformed metadata response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The metadata API answered 403.
    #[error("metadata API denied access")]
    Unauthorized,

    /// Any status the operation does not expect.
    #[error("status: {0}")]
    Status(u16),
}

/// Client-facing errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The upstream metadata API rejected the forwarded credentials.
    #[error("Credentials needed")]
    Unauthorized,

    /// The object is unknown.
    #[error("Object not found")]
    NotFound,

    /// The request named an invalid object.
    #[error("{message}")]
    InvalidObject { message: String },

    /// The request body could not be parsed.
    #[error("{message}")]
    BadRequest { message: String },

    /// The metadata API or object store failed.
    #[error("Upstream failure: {0}")]
    Upstream(String),
}

impl ApiError {
    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::InvalidObject { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<MetaError> for ApiError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Unauthorized => ApiError::Unauthorized,
            MetaError::Status(404) => ApiError::NotFound,
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();

        let body = Json(serde_json::json!({
            "message": self.to_string(),
            "request_id": request_id,
        }));

        if matches!(self, ApiError::Unauthorized) {
            return (
                status,
                [
                    (header::WWW_AUTHENTICATE, "Basic realm=\"lfsgate\"".to_string()),
                    (header::HeaderName::from_static("x-request-id"), request_id),
                ],
                body,
            )
                .into_response();
        }

        (
            status,
            [(header::HeaderName::from_static("x-request-id"), request_id)],
            body,
        )
            .into_response()
    }
}
