//! HTTP mapping for coordination errors.
//!
//! Handlers return `Result<_, ApiError>`; the wrapper picks the status code
//! and serializes the `{"error": {...}}` envelope. The one unusual mapping is
//! `RESOURCE_LOCKED` → 423 Locked, the WebDAV status the original API used
//! for "someone else is editing this order".

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ordhub_core::errors::{CoordError, ErrorResponse};

/// Newtype carrying a [`CoordError`] out of an axum handler.
#[derive(Debug)]
pub struct ApiError(pub CoordError);

impl ApiError {
    /// The HTTP status this error maps to.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            CoordError::ResourceLocked { .. } => StatusCode::LOCKED,
            CoordError::LockNotHeld { .. } => StatusCode::CONFLICT,
            CoordError::UnknownTopic { .. } => StatusCode::NOT_FOUND,
            CoordError::InvalidParams { .. } => StatusCode::BAD_REQUEST,
            CoordError::NotAvailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            CoordError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::from(&self.0))).into_response()
    }
}
