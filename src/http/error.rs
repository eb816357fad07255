//! Gateway error responses.

use axum::http::header::InvalidHeaderValue;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::relay::Unauthenticated;
use crate::upstream::UpstreamError;

/// Everything that stops a request before an upstream response can be relayed.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not Found")]
    NotFound,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
    #[error("Invalid JSON body")]
    InvalidBody(#[source] serde_json::Error),
    #[error("Payload Too Large")]
    PayloadTooLarge,
    #[error("Unreadable request body")]
    UnreadableBody(#[source] axum::Error),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("failed to encode session cookie: {0}")]
    Cookie(#[from] InvalidHeaderValue),
}

impl From<Unauthenticated> for GatewayError {
    fn from(_: Unauthenticated) -> Self {
        GatewayError::Unauthorized
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::InvalidBody(_) | GatewayError::UnreadableBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Upstream(_) | GatewayError::Cookie(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            json!({ "message": "Internal Server Error", "error": self.to_string() })
        } else {
            json!({ "message": self.to_string() })
        };
        (status, Json(body)).into_response()
    }
}
