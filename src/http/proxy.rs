//! API relay handler.
//!
//! Every `/api/...` path that is not a session endpoint lands here, is
//! matched against the route table and relayed upstream with the resolved
//! bearer token.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::response::{IntoResponse, Response};

use crate::http::error::GatewayError;
use crate::http::request::{read_json_body, request_id};
use crate::http::response::{relay_response, translate_email_conflict};
use crate::http::server::{AppState, RuntimeState};
use crate::observability::metrics;
use crate::relay::TokenRelay;
use crate::routing::RouteMatch;
use crate::session::{append_set_cookies, issue_session, CookiePolicy, SessionTokens};
use crate::upstream::UpstreamRequest;

const UNROUTED: &str = "none";

/// `ANY /api/{*path}`
pub async fn api_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let runtime = state.runtime.load_full();

    let (route, result) = relay_api(&state, runtime, request).await;
    let response = result.unwrap_or_else(IntoResponse::into_response);

    metrics::record_request(&route, method.as_str(), response.status().as_u16(), start);
    response
}

/// Any path outside the API surface.
pub async fn not_found() -> GatewayError {
    GatewayError::NotFound
}

async fn relay_api(
    state: &AppState,
    runtime: Arc<RuntimeState>,
    request: Request<Body>,
) -> (String, Result<Response, GatewayError>) {
    let (parts, body) = request.into_parts();
    let config = &runtime.config;

    let (route, upstream_path) = match runtime.routes.match_request(&parts.method, parts.uri.path()) {
        RouteMatch::Matched { route, upstream_path } => (route, upstream_path),
        RouteMatch::MethodNotAllowed(route) => {
            return (route.name.clone(), Err(GatewayError::MethodNotAllowed));
        }
        RouteMatch::NoMatch => {
            tracing::debug!(path = %parts.uri.path(), "No route matched");
            return (UNROUTED.to_string(), Err(GatewayError::NotFound));
        }
    };
    let name = route.name.clone();

    // Body errors surface before any refresh rotates the token.
    let body = match read_json_body(body, config.security.max_body_size).await {
        Ok(body) => body,
        Err(e) => return (name, Err(e)),
    };

    let relay = TokenRelay::new(state.upstream.as_ref(), config.relay.reauthenticate_on_401);
    let resolved = match relay.resolve(&parts.headers, route.auth).await {
        Ok(resolved) => resolved,
        Err(e) => {
            tracing::debug!(route = %name, "Unauthenticated API request");
            return (name, Err(e.into()));
        }
    };

    let policy = CookiePolicy::for_request(&parts.headers, &parts.uri, &config.session, config.session.same_site);
    let minted = resolved.refreshed.clone();

    let upstream_request = UpstreamRequest {
        method: parts.method.clone(),
        path: upstream_path,
        query: parts.uri.query().map(str::to_string),
        body,
        bearer: None,
        request_id: request_id(&parts.headers),
    };

    tracing::debug!(
        route = %name,
        method = %upstream_request.method,
        upstream_path = %upstream_request.path,
        "Relaying request"
    );

    let outcome = match relay.forward(upstream_request, resolved).await {
        Ok(outcome) => outcome,
        Err(e) => {
            let mut response = GatewayError::from(e).into_response();
            // The refresh already rotated the session.
            if let Some(tokens) = &minted {
                if let Err(e) = attach_session(&mut response, tokens, &policy) {
                    return (name, Err(e));
                }
            }
            return (name, Ok(response));
        }
    };

    let upstream = match &route.email_conflict_message {
        Some(message) => translate_email_conflict(&parts.method, outcome.response, message),
        None => outcome.response,
    };

    if !upstream.is_success() {
        tracing::info!(route = %name, status = %upstream.status, "Upstream returned an error status");
    }

    let mut response = relay_response(upstream, Vec::new());
    if let Some(tokens) = &outcome.refreshed {
        if let Err(e) = attach_session(&mut response, tokens, &policy) {
            return (name, Err(e));
        }
    }
    (name, Ok(response))
}

fn attach_session(
    response: &mut Response,
    tokens: &SessionTokens,
    policy: &CookiePolicy,
) -> Result<(), GatewayError> {
    let cookies = issue_session(tokens, policy)?;
    append_set_cookies(response.headers_mut(), cookies);
    Ok(())
}
