//! Response relay.
//!
//! # Responsibilities
//! - Turn an upstream status + JSON body into a client response
//! - Attach re-issued session cookies
//! - Translate e-mail conflicts on account routes
//!
//! # Design Decisions
//! - Status codes pass through untouched; the conflict message is the only rewrite
//! - 204/304 are sent without a body
//! - `Cache-Control: no-store` is added by a router layer, not here

use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

use crate::session::append_set_cookies;
use crate::upstream::UpstreamResponse;

/// Relay an upstream response, with optional `Set-Cookie` values.
pub fn relay_response(upstream: UpstreamResponse, set_cookies: Vec<HeaderValue>) -> Response {
    let mut response = json_response(upstream.status, upstream.body);
    append_set_cookies(response.headers_mut(), set_cookies);
    response
}

/// A JSON response with the given status.
pub fn json_response(status: StatusCode, body: Value) -> Response {
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return status.into_response();
    }
    (status, Json(body)).into_response()
}

/// Whether the upstream refused an account write because the address is taken.
pub fn is_email_conflict(response: &UpstreamResponse) -> bool {
    if response.is_success() {
        return false;
    }
    if response.status == StatusCode::CONFLICT {
        return true;
    }
    ["message", "error"].iter().any(|field| {
        response
            .body
            .get(*field)
            .and_then(Value::as_str)
            .map(|m| m.to_ascii_lowercase().contains("already exists"))
            .unwrap_or(false)
    })
}

/// Replace the body of an e-mail conflict on write methods; keep the status.
pub fn translate_email_conflict(
    method: &Method,
    response: UpstreamResponse,
    message: &str,
) -> UpstreamResponse {
    let is_write = matches!(*method, Method::POST | Method::PUT | Method::PATCH);
    if is_write && is_email_conflict(&response) {
        tracing::info!(status = %response.status, "Upstream reported an e-mail conflict");
        UpstreamResponse::new(response.status, json!({ "message": message }))
    } else {
        response
    }
}
