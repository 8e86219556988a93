//! JSON envelopes and error responses

use crate::error::PointsError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serialize `body` as a JSON response with the given status
pub struct JsonResponse<T>(pub StatusCode, pub T);

impl<T: Serialize> IntoResponse for JsonResponse<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.1) {
            Ok(body) => (
                self.0,
                [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
                body,
            )
                .into_response(),
            Err(e) => {
                error!(error = %e, "failed to encode response body");
                ApiError::Server.into_response()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    ok: bool,
    error: &'a str,
}

/// Errors surfaced to HTTP callers, each with a short stable message
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid address")]
    InvalidAddress,

    #[error("Empty body")]
    EmptyBody,

    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Invalid payload")]
    InvalidPayload,

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Unknown type")]
    UnknownType,

    #[error("Missing {0}")]
    Missing(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Server error")]
    Server,

    /// Server failure whose message is exposed to the caller
    #[error("{0}")]
    ServerDetail(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Server | ApiError::ServerDetail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Map a failure on the tracking path, where server errors carry their message
    pub fn detailed(err: PointsError) -> Self {
        ApiError::from(err)
    }

    /// Map a failure on the snapshot path, where server errors stay generic
    pub fn generic(err: PointsError) -> Self {
        match ApiError::from(err) {
            ApiError::ServerDetail(_) => ApiError::Server,
            other => other,
        }
    }
}

impl From<PointsError> for ApiError {
    fn from(err: PointsError) -> Self {
        match err {
            PointsError::InvalidAddress => ApiError::InvalidAddress,
            PointsError::EmptyBody => ApiError::EmptyBody,
            PointsError::PayloadTooLarge { .. } => ApiError::PayloadTooLarge,
            PointsError::JsonError(_) => ApiError::InvalidJson,
            PointsError::InvalidPayload(_) => ApiError::InvalidPayload,
            PointsError::MissingField(field) => ApiError::Missing(field),
            PointsError::UnknownType(_) => ApiError::UnknownType,
            other => {
                warn!(error = %other, "request failed");
                ApiError::ServerDetail(other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let body = ErrorBody {
            ok: false,
            error: &message,
        };
        match serde_json::to_vec(&body) {
            Ok(bytes) => (
                self.status(),
                [(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE))],
                bytes,
            )
                .into_response(),
            Err(_) => self.status().into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::InvalidAddress.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::PayloadTooLarge.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ApiError::MethodNotAllowed.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ApiError::Server.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages_are_stable() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(ApiError::from(PointsError::from(json_err)).to_string(), "Invalid JSON");
        assert_eq!(
            ApiError::from(PointsError::MissingField("sessionId or deviceId".to_string()))
                .to_string(),
            "Missing sessionId or deviceId"
        );
        assert_eq!(
            ApiError::from(PointsError::UnknownType("x".to_string())).to_string(),
            "Unknown type"
        );
    }

    #[test]
    fn test_store_errors_by_path() {
        let store_err = || PointsError::Store(StoreError::InvalidKey("k".to_string()));
        assert_eq!(ApiError::generic(store_err()).to_string(), "Server error");

        let detailed = ApiError::detailed(store_err());
        assert_eq!(detailed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(detailed.to_string().contains("Invalid document key"));
    }
}
