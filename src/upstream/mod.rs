//! Upstream REST API boundary.
//!
//! # Data Flow
//! ```text
//! relay / auth handlers
//!     → UpstreamApi (trait, injected through AppState)
//!     → client.rs (HttpUpstream: reqwest, per-call timeout)
//!     → types.rs (UpstreamResponse: status + best-effort JSON)
//! ```
//!
//! # Design Decisions
//! - Non-2xx statuses are data, not errors; only transport and decoding fail
//! - No retries: a failed call is surfaced immediately
//! - The trait is the seam tests use to count upstream calls

pub mod client;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::session::SessionTokens;

pub use client::{tokens_from_body, HttpUpstream};
pub use types::{RefreshError, UpstreamError, UpstreamRequest, UpstreamResponse};

/// Operations the gateway needs from the upstream REST API.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// `POST /admin/login` with the browser's credentials.
    async fn login(&self, body: Value) -> Result<UpstreamResponse, UpstreamError>;

    /// `POST /refresh`: trade a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, RefreshError>;

    /// `POST /logout`.
    async fn logout(&self, bearer: Option<&str>) -> Result<UpstreamResponse, UpstreamError>;

    /// Relay an API call.
    async fn forward(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError>;
}
