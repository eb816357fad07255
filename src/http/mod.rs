//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware: request ID, trace, timeout, limits, no-store)
//!     → auth.rs (login / logout / refresh) | proxy.rs (everything else under /api)
//!     → request.rs (request ID, JSON body)
//!     → [routing + relay decide upstream call]
//!     → response.rs (status/body passthrough, Set-Cookie)
//!     → Send to client
//! ```

pub mod auth;
pub mod error;
pub mod health;
pub mod proxy;
pub mod request;
pub mod response;
pub mod server;

pub use error::GatewayError;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, RuntimeState};
