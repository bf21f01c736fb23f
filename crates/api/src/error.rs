//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::DomainError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog or reservation failure.
    Domain(DomainError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Domain(err) => domain_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_error_to_response(err: DomainError) -> (StatusCode, String) {
    let status = match &err {
        DomainError::BookNotFound(_)
        | DomainError::TitleNotFound { .. }
        | DomainError::CartNotFound(_)
        | DomainError::NoCart(_)
        | DomainError::LineNotFound(_)
        | DomainError::EmptyResult => StatusCode::NOT_FOUND,
        DomainError::InsufficientStock { .. } => StatusCode::CONFLICT,
        DomainError::InvalidQuantity(_) => StatusCode::BAD_REQUEST,
        DomainError::Transient(reason) => {
            tracing::warn!(%reason, "store temporarily unavailable");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    (status, err.to_string())
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<common::InvalidQuantity> for ApiError {
    fn from(err: common::InvalidQuantity) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}
