//! Token relay subsystem.
//!
//! # Data Flow
//! ```text
//! API request headers + route auth policy
//!     → resolve(): Authorization header | accessToken cookie
//!         | refreshToken cookie → upstream /refresh (at most once)
//!         | Unauthenticated (401, no upstream call)
//!     → forward(): upstream call with the resolved bearer
//!         → 401 on a cookie token: refresh once, replay once
//!     → RelayOutcome (upstream response + tokens to re-issue as cookies)
//! ```
//!
//! # Design Decisions
//! - One request = one strictly sequential refresh → forward → cookie chain
//! - The token minted by a refresh is the one forwarded and the one written
//! - Refresh failures collapse into "unauthenticated", never a 500

use axum::http::{HeaderMap, StatusCode};

use crate::config::AuthPolicy;
use crate::observability::metrics;
use crate::session::{bearer_from_headers, refresh_token_from_headers, Credential, CredentialSource, SessionTokens};
use crate::upstream::{UpstreamApi, UpstreamError, UpstreamRequest, UpstreamResponse};

/// No token could be resolved or refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unauthenticated")]
pub struct Unauthenticated;

/// The bearer a request will be forwarded with.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub credential: Option<Credential>,
    /// Set when the credential was minted from the refresh cookie.
    pub refreshed: Option<SessionTokens>,
    auth: AuthPolicy,
    refresh_token: Option<String>,
}

impl ResolvedCredential {
    pub fn bearer(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.bearer.as_str())
    }

    fn refreshed_with(auth: AuthPolicy, tokens: SessionTokens) -> Self {
        Self {
            credential: Some(Credential {
                bearer: tokens.bearer(),
                source: CredentialSource::Refreshed,
            }),
            refreshed: Some(tokens),
            auth,
            refresh_token: None,
        }
    }
}

/// Result of relaying one request.
#[derive(Debug, Clone)]
pub struct RelayOutcome {
    pub response: UpstreamResponse,
    /// Tokens to write back as session cookies.
    pub refreshed: Option<SessionTokens>,
}

/// Resolves credentials and relays requests to the upstream.
pub struct TokenRelay<'a> {
    upstream: &'a dyn UpstreamApi,
    reauthenticate_on_401: bool,
}

impl<'a> TokenRelay<'a> {
    pub fn new(upstream: &'a dyn UpstreamApi, reauthenticate_on_401: bool) -> Self {
        Self {
            upstream,
            reauthenticate_on_401,
        }
    }

    /// Resolve the bearer for a route.
    pub async fn resolve(
        &self,
        headers: &HeaderMap,
        auth: AuthPolicy,
    ) -> Result<ResolvedCredential, Unauthenticated> {
        let refresh_token = refresh_token_from_headers(headers);

        if let Some(credential) = bearer_from_headers(headers) {
            return Ok(ResolvedCredential {
                credential: Some(credential),
                refreshed: None,
                auth,
                refresh_token,
            });
        }

        match auth {
            AuthPolicy::Public => Ok(ResolvedCredential {
                credential: None,
                refreshed: None,
                auth,
                refresh_token,
            }),
            AuthPolicy::Bearer => Err(Unauthenticated),
            AuthPolicy::Refresh => {
                let token = refresh_token.ok_or(Unauthenticated)?;
                let tokens = self.refresh(&token).await.ok_or(Unauthenticated)?;
                Ok(ResolvedCredential::refreshed_with(auth, tokens))
            }
        }
    }

    /// Exchange a refresh token, logging and counting the outcome.
    pub async fn refresh(&self, refresh_token: &str) -> Option<SessionTokens> {
        match self.upstream.refresh(refresh_token).await {
            Ok(tokens) => {
                tracing::debug!(rotated = tokens.refresh.is_some(), "Session refreshed");
                metrics::record_refresh("success");
                Some(tokens)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Session refresh failed");
                metrics::record_refresh(e.outcome());
                None
            }
        }
    }

    /// Forward with the resolved bearer.
    pub async fn forward(
        &self,
        mut request: UpstreamRequest,
        resolved: ResolvedCredential,
    ) -> Result<RelayOutcome, UpstreamError> {
        request.bearer = resolved.bearer().map(str::to_string);
        let response = self.upstream.forward(request.clone()).await?;

        if response.status == StatusCode::UNAUTHORIZED && self.should_reauthenticate(&resolved) {
            if let Some(token) = resolved.refresh_token.as_deref() {
                tracing::info!(path = %request.path, "Upstream rejected cookie token, refreshing");
                if let Some(tokens) = self.refresh(token).await {
                    request.bearer = Some(tokens.bearer());
                    let response = self.upstream.forward(request).await?;
                    return Ok(RelayOutcome {
                        response,
                        refreshed: Some(tokens),
                    });
                }
            }
        }

        Ok(RelayOutcome {
            response,
            refreshed: resolved.refreshed,
        })
    }

    fn should_reauthenticate(&self, resolved: &ResolvedCredential) -> bool {
        self.reauthenticate_on_401
            && resolved.auth.allows_refresh()
            && resolved.refreshed.is_none()
            && matches!(
                resolved.credential,
                Some(Credential {
                    source: CredentialSource::Cookie,
                    ..
                })
            )
    }
}
