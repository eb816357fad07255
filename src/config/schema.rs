//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Message returned when the upstream reports an e-mail address collision.
pub const DEFAULT_EMAIL_CONFLICT_MESSAGE: &str = "このメールアドレスは既に登録されています";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Upstream REST API location.
    pub upstream: UpstreamConfig,

    /// Session cookie attributes.
    pub session: SessionConfig,

    /// Token relay behaviour.
    pub relay: RelayConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request hardening.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// API route table. Empty means the built-in console routes.
    pub routes: Vec<RouteConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL every upstream path is joined onto.
    pub base_url: String,

    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// `SameSite` cookie attribute as written in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Session cookie configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of the access-token cookies.
    pub access_max_age_secs: i64,

    /// Lifetime of the refresh-token cookies.
    pub refresh_max_age_secs: i64,

    /// `SameSite` for cookies re-issued by proxied API calls.
    pub same_site: SameSitePolicy,

    /// `SameSite` for cookies issued by the login route.
    pub login_same_site: SameSitePolicy,

    /// Production deployments always mark cookies `Secure`.
    pub production: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_max_age_secs: 15 * 60,
            refresh_max_age_secs: 30 * 24 * 60 * 60,
            same_site: SameSitePolicy::Lax,
            login_same_site: SameSitePolicy::Strict,
            production: false,
        }
    }
}

/// Token relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Refresh once and replay when the upstream rejects a cookie token with 401.
    pub reauthenticate_on_401: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reauthenticate_on_401: true,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// How a route obtains its bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthPolicy {
    /// Forward without requiring a token; attach one if the browser sent it.
    Public,
    /// Require a header or cookie token, never refresh.
    Bearer,
    /// Require a token, silently refreshing from the refresh cookie.
    #[default]
    Refresh,
}

impl AuthPolicy {
    pub fn allows_refresh(self) -> bool {
        matches!(self, AuthPolicy::Refresh)
    }
}

/// Route configuration mapping a browser API prefix to an upstream prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Browser-side path prefix (e.g., "/api/merchants").
    pub path_prefix: String,

    /// Upstream path prefix (e.g., "/admin/merchants").
    pub upstream_prefix: String,

    #[serde(default)]
    pub auth: AuthPolicy,

    /// Allowed methods; empty allows all.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// Replace upstream e-mail conflict errors with this message.
    #[serde(default)]
    pub email_conflict_message: Option<String>,
}

impl RouteConfig {
    /// A route open to every method at priority 0.
    pub fn new(name: &str, path_prefix: &str, upstream_prefix: &str, auth: AuthPolicy) -> Self {
        Self {
            name: name.to_string(),
            path_prefix: path_prefix.to_string(),
            upstream_prefix: upstream_prefix.to_string(),
            auth,
            methods: Vec::new(),
            priority: 0,
            email_conflict_message: None,
        }
    }

    /// The console's API surface.
    pub fn console_defaults() -> Vec<RouteConfig> {
        use AuthPolicy::*;

        let mut admin_accounts = Self::new("admin-accounts", "/api/admin-accounts", "/admin-accounts", Refresh);
        admin_accounts.email_conflict_message = Some(DEFAULT_EMAIL_CONFLICT_MESSAGE.to_string());

        let mut email_confirm = Self::new("email-confirm", "/api/email/change/confirm", "/email/change/confirm", Public);
        email_confirm.priority = 10;

        vec![
            admin_accounts,
            Self::new("coupons", "/api/coupons", "/coupons", Refresh),
            Self::new("shops", "/api/shops", "/shops", Refresh),
            Self::new("merchants", "/api/merchants", "/admin/merchants", Refresh),
            Self::new("users", "/api/users", "/admin/users", Refresh),
            Self::new("applications", "/api/applications", "/applications", Refresh),
            Self::new("genres", "/api/genres", "/genres", Refresh),
            Self::new("scenes", "/api/scenes", "/scenes", Refresh),
            Self::new("companies", "/api/companies", "/companies", Refresh),
            Self::new("offices", "/api/offices", "/offices", Refresh),
            Self::new("staff", "/api/staff", "/staff", Refresh),
            Self::new("password", "/api/password", "/password", Public),
            email_confirm,
            Self::new("email", "/api/email", "/email", Refresh),
        ]
    }
}

impl GatewayConfig {
    /// Configured routes, or the console defaults when none are configured.
    pub fn effective_routes(&self) -> Vec<RouteConfig> {
        if self.routes.is_empty() {
            RouteConfig::console_defaults()
        } else {
            self.routes.clone()
        }
    }
}
