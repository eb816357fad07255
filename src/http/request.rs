//! Inbound request helpers.
//!
//! # Responsibilities
//! - Read the request ID assigned by the request-id layer
//! - Read and parse JSON bodies within the configured limit
//!
//! # Design Decisions
//! - Bodies are fully buffered: upstream calls carry JSON, not streams
//! - An empty body is "no body", not a parse error

use axum::body::Body;
use axum::http::HeaderMap;
use http_body_util::LengthLimitError;
use serde_json::Value;

use crate::http::error::GatewayError;

/// Header carrying the per-request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID, if one was assigned.
pub fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Buffer the body and parse it as JSON.
pub async fn read_json_body(body: Body, limit: usize) -> Result<Option<Value>, GatewayError> {
    let bytes = axum::body::to_bytes(body, limit).await.map_err(|e| {
        if exceeds_limit(&e) {
            GatewayError::PayloadTooLarge
        } else {
            tracing::debug!(error = %e, "Failed to read request body");
            GatewayError::UnreadableBody(e)
        }
    })?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(GatewayError::InvalidBody)
}

/// Whether a body error comes from a length limit, ours or the layer's.
fn exceeds_limit(error: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
