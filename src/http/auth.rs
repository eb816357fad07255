//! Session endpoints: login, logout and explicit refresh.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, StatusCode};
use axum::response::Response;
use serde_json::{json, Value};

use crate::http::error::GatewayError;
use crate::http::request::read_json_body;
use crate::http::response::{json_response, relay_response};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::TokenRelay;
use crate::session::{
    append_set_cookies, bearer_from_headers, clear_session, issue_session,
    refresh_token_from_headers, CookiePolicy, SessionCookiePair, TokenKind,
};
use crate::upstream::UpstreamResponse;

/// `POST /api/auth/login`
///
/// Tokens from the upstream are moved out of the JSON body and into
/// httpOnly cookies; the browser only ever sees the account metadata.
pub async fn login(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let runtime = state.runtime.load_full();
    let session = &runtime.config.session;
    let (parts, body) = request.into_parts();

    let credentials = read_json_body(body, runtime.config.security.max_body_size)
        .await?
        .unwrap_or(Value::Null);
    let upstream = state.upstream.login(credentials).await?;

    if !upstream.is_success() {
        tracing::info!(status = %upstream.status, "Login rejected by upstream");
        return Ok(relay_response(upstream, Vec::new()));
    }

    let status = upstream.status;
    let mut body = upstream.body;
    let policy = CookiePolicy::for_request(&parts.headers, &parts.uri, session, session.login_same_site);

    let mut cookies: Vec<HeaderValue> = Vec::new();
    for kind in TokenKind::ALL {
        if let Some(token) = take_token(&mut body, kind) {
            cookies.extend(SessionCookiePair::new(kind, token).issue(&policy)?);
        }
    }
    if cookies.is_empty() {
        tracing::warn!("Upstream login succeeded without issuing tokens");
    } else {
        tracing::info!(secure = policy.secure, "Login succeeded, session cookies issued");
    }

    Ok(relay_response(UpstreamResponse::new(status, body), cookies))
}

/// Remove a token field from a login body, returning it when non-empty.
/// Upstream field names match the cookie names.
fn take_token(body: &mut Value, kind: TokenKind) -> Option<String> {
    let field = kind.cookie_name();
    match body.as_object_mut()?.remove(field)? {
        Value::String(token) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// `POST /api/auth/logout`
///
/// Local cookies are cleared whatever the upstream says.
pub async fn logout(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let runtime = state.runtime.load_full();
    let session = &runtime.config.session;
    let headers = request.headers();

    let bearer = bearer_from_headers(headers).map(|c| c.bearer);
    let outcome = match state.upstream.logout(bearer.as_deref()).await {
        Ok(response) if response.is_success() => "ok",
        Ok(response) => {
            tracing::warn!(status = %response.status, "Upstream logout rejected; clearing session anyway");
            "rejected"
        }
        Err(e) => {
            tracing::warn!(error = %e, "Upstream logout failed; clearing session anyway");
            "error"
        }
    };
    metrics::record_logout(outcome);

    let policy = CookiePolicy::for_request(headers, request.uri(), session, session.same_site);
    let mut response = json_response(StatusCode::OK, json!({ "message": "Logged out" }));
    append_set_cookies(response.headers_mut(), clear_session(&policy)?);
    Ok(response)
}

/// `POST /api/auth/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    let runtime = state.runtime.load_full();
    let session = &runtime.config.session;
    let headers = request.headers();

    let token = refresh_token_from_headers(headers).ok_or(GatewayError::Unauthorized)?;
    let relay = TokenRelay::new(state.upstream.as_ref(), runtime.config.relay.reauthenticate_on_401);
    let tokens = relay.refresh(&token).await.ok_or(GatewayError::Unauthorized)?;

    let policy = CookiePolicy::for_request(headers, request.uri(), session, session.same_site);
    let mut response = json_response(StatusCode::OK, json!({ "message": "Token refreshed" }));
    append_set_cookies(response.headers_mut(), issue_session(&tokens, &policy)?);
    Ok(response)
}
