//! JSON error responses.
//!
//! Every failure leaves the gateway as an [`ErrorBody`]; internal details
//! stay in the logs.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use switchyard_core::chat::ErrorBody;
use switchyard_core::error::Error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, body: ErrorBody) -> Self {
        Self { status, body }
    }

    /// Map a domain error: validation → 400, storage → 503, the rest → 500.
    pub fn from_error(err: &Error, request_id: &str) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if matches!(err, Error::Store(_) | Error::Index(_)) {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self::new(status, ErrorBody::from_error(err, request_id))
    }

    /// Malformed or oversized request bodies.
    pub fn from_rejection(rejection: &JsonRejection, request_id: &str) -> Self {
        let status = rejection.status();
        let (code, message) = if status == StatusCode::PAYLOAD_TOO_LARGE {
            ("PAYLOAD_TOO_LARGE", "Request body is too large.")
        } else {
            (
                "INVALID_REQUEST",
                "Request body must be JSON with message, user_id and conversation_id.",
            )
        };
        Self::new(status, ErrorBody::new(code, message, request_id))
    }

    pub fn not_found(what: &str, request_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            ErrorBody::new("NOT_FOUND", format!("{what} not found."), request_id),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
