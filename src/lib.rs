//! Console session gateway library.
//!
//! Keeps admin-console tokens in httpOnly cookies and relays `/api/...`
//! calls to the upstream API with the matching bearer token, refreshing
//! expired sessions on the way.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod routing;
pub mod session;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use upstream::{HttpUpstream, UpstreamApi};
