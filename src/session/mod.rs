//! Browser session subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → credentials.rs (Authorization header, then accessToken cookie)
//!     → [relay refreshes when needed]
//!     → cookies.rs (SessionCookiePair: plain + __Host- Set-Cookie values)
//!     → Outbound response headers
//! ```
//!
//! # Design Decisions
//! - Tokens never appear in response bodies, only in httpOnly cookies
//! - A token is always written under both names at once
//! - Cookie attributes are computed per request (protocol decides `Secure`)

pub mod cookies;
pub mod credentials;

pub use cookies::{
    append_set_cookies, clear_session, issue_session, CookiePolicy, SessionCookiePair,
    SessionTokens, TokenKind,
};
pub use credentials::{bearer_from_headers, refresh_token_from_headers, Credential, CredentialSource};
