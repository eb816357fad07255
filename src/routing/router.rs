//! Route lookup and upstream path rewriting.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Rewrite the browser path into the upstream path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Ordered by priority, then by prefix length (most specific first)
//! - Explicit NoMatch / MethodNotAllowed rather than silent default

use axum::http::Method;

use crate::config::{AuthPolicy, RouteConfig};
use crate::routing::matcher::{Matcher, MethodMatcher, PathPrefixMatcher, RequestHead};

/// A compiled route.
#[derive(Debug)]
pub struct RouteEntry {
    pub name: String,
    pub upstream_prefix: String,
    pub auth: AuthPolicy,
    pub priority: u32,
    pub email_conflict_message: Option<String>,
    path: PathPrefixMatcher,
    methods: MethodMatcher,
}

impl RouteEntry {
    fn compile(config: RouteConfig) -> Self {
        Self {
            path: PathPrefixMatcher::new(config.path_prefix),
            methods: MethodMatcher::new(&config.methods),
            name: config.name,
            upstream_prefix: config.upstream_prefix,
            auth: config.auth,
            priority: config.priority,
            email_conflict_message: config.email_conflict_message,
        }
    }

    pub fn path_prefix(&self) -> &str {
        self.path.prefix()
    }
}

/// Outcome of a route lookup.
#[derive(Debug)]
pub enum RouteMatch<'r> {
    Matched {
        route: &'r RouteEntry,
        upstream_path: String,
    },
    MethodNotAllowed(&'r RouteEntry),
    NoMatch,
}

/// Compiled API route table.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_config(configs: Vec<RouteConfig>) -> Self {
        let mut routes: Vec<RouteEntry> = configs.into_iter().map(RouteEntry::compile).collect();
        routes.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.path_prefix().len().cmp(&a.path_prefix().len()))
        });

        for route in &routes {
            tracing::debug!(
                route = %route.name,
                path_prefix = %route.path_prefix(),
                upstream_prefix = %route.upstream_prefix,
                auth = ?route.auth,
                "Route compiled"
            );
        }

        Self { routes }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Find the route for a request and compute its upstream path.
    pub fn match_request(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        let head = RequestHead { method, path };
        let mut method_mismatch = None;

        for route in &self.routes {
            let Some(rest) = route.path.remainder(path) else {
                continue;
            };
            if !route.methods.matches(&head) {
                method_mismatch.get_or_insert(route);
                continue;
            }
            return RouteMatch::Matched {
                route,
                upstream_path: format!("{}{}", route.upstream_prefix, rest),
            };
        }

        match method_mismatch {
            Some(route) => RouteMatch::MethodNotAllowed(route),
            None => RouteMatch::NoMatch,
        }
    }
}
