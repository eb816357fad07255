//! Request/response shapes exchanged with the upstream REST API.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

/// Failure to obtain a usable response from the upstream.
///
/// A non-2xx status is *not* an error: it is relayed to the browser as-is.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("malformed upstream response: {0}")]
    Body(String),
}

/// Why a refresh-token exchange did not produce a session.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh rejected with status {0}")]
    Rejected(StatusCode),
    #[error("refresh response carried no access token")]
    MissingAccessToken,
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl RefreshError {
    /// Label used for metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            RefreshError::Rejected(_) => "rejected",
            RefreshError::MissingAccessToken => "missing_token",
            RefreshError::Upstream(_) => "error",
        }
    }
}

/// A call to relay upstream.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    /// Upstream path, starting with `/`.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub body: Option<Value>,
    /// Full `Authorization` header value.
    pub bearer: Option<String>,
    pub request_id: Option<String>,
}

impl UpstreamRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            body: None,
            bearer: None,
            request_id: None,
        }
    }

    pub fn with_bearer(mut self, bearer: impl Into<String>) -> Self {
        self.bearer = Some(bearer.into());
        self
    }
}

/// Upstream status plus best-effort JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `message` field of the body, when it has one.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// Interpret a raw upstream body.
    ///
    /// Successful responses must be JSON (or empty). Error responses fall
    /// back to `{"message": ...}` built from the text or the status reason.
    pub fn from_parts(status: StatusCode, bytes: &[u8]) -> Result<Self, UpstreamError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            let body = if status.is_success() {
                Value::Null
            } else {
                json!({ "message": reason(status) })
            };
            return Ok(Self::new(status, body));
        }

        match serde_json::from_slice::<Value>(bytes) {
            Ok(body) => Ok(Self::new(status, body)),
            Err(e) if status.is_success() => Err(UpstreamError::Body(e.to_string())),
            Err(_) => {
                let text = String::from_utf8_lossy(bytes).trim().to_string();
                Ok(Self::new(status, json!({ "message": text })))
            }
        }
    }
}

fn reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_body_kept() {
        let res = UpstreamResponse::from_parts(StatusCode::CONFLICT, br#"{"message":"dup"}"#).unwrap();
        assert_eq!(res.status, StatusCode::CONFLICT);
        assert_eq!(res.message(), Some("dup"));
    }

    #[test]
    fn test_error_text_fallback() {
        let res = UpstreamResponse::from_parts(StatusCode::BAD_GATEWAY, b"  upstream down\n").unwrap();
        assert_eq!(res.body, json!({ "message": "upstream down" }));

        let empty = UpstreamResponse::from_parts(StatusCode::NOT_FOUND, b"").unwrap();
        assert_eq!(empty.body, json!({ "message": "Not Found" }));
    }

    #[test]
    fn test_success_body() {
        let empty = UpstreamResponse::from_parts(StatusCode::NO_CONTENT, b"").unwrap();
        assert_eq!(empty.body, Value::Null);

        let garbage = UpstreamResponse::from_parts(StatusCode::OK, b"<html>");
        assert!(matches!(garbage, Err(UpstreamError::Body(_))));
    }
}
