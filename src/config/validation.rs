//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, cookie lifetimes > 0)
//! - Check the upstream URL and bind address parse
//! - Reject route tables that could shadow each other ambiguously
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::Method;

use crate::config::schema::{GatewayConfig, SameSitePolicy};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    match url::Url::parse(&config.upstream.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "upstream.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("upstream.base_url", e.to_string())),
    }

    if config.upstream.timeout_secs == 0 {
        errors.push(ValidationError::new("upstream.timeout_secs", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.session.access_max_age_secs <= 0 {
        errors.push(ValidationError::new("session.access_max_age_secs", "must be greater than 0"));
    }
    if config.session.refresh_max_age_secs <= 0 {
        errors.push(ValidationError::new("session.refresh_max_age_secs", "must be greater than 0"));
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    // Browsers drop SameSite=None cookies that are not Secure.
    for (field, policy) in [
        ("session.same_site", config.session.same_site),
        ("session.login_same_site", config.session.login_same_site),
    ] {
        if policy == SameSitePolicy::None && !config.session.production {
            errors.push(ValidationError::new(field, "'none' requires session.production = true"));
        }
    }

    let mut names = HashSet::new();
    let mut prefixes = HashSet::new();
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{}]", i);
        if !names.insert(route.name.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate route name '{}'", route.name)));
        }
        if !route.path_prefix.starts_with("/api/") {
            errors.push(ValidationError::new(
                format!("{}.path_prefix", field),
                "must start with '/api/'",
            ));
        }
        if route.path_prefix.ends_with('/') {
            errors.push(ValidationError::new(
                format!("{}.path_prefix", field),
                "must not end with '/'",
            ));
        }
        if !route.upstream_prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.upstream_prefix", field),
                "must start with '/'",
            ));
        }
        if !prefixes.insert((route.path_prefix.as_str(), route.priority)) {
            errors.push(ValidationError::new(
                format!("{}.path_prefix", field),
                format!("'{}' already routed at priority {}", route.path_prefix, route.priority),
            ));
        }
        for method in &route.methods {
            if method.parse::<Method>().is_err() {
                errors.push(ValidationError::new(
                    format!("{}.methods", field),
                    format!("invalid method '{}'", method),
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
