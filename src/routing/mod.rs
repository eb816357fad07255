//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming API request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate match conditions)
//!     → Return: route + upstream path, MethodNotAllowed, or NoMatch
//!
//! Route Compilation (at startup and on reload):
//!     RouteConfig[] (or the console defaults)
//!     → Sort by priority, then prefix length
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins

pub mod matcher;
pub mod router;

pub use router::{RouteEntry, RouteMatch, RouteTable};
