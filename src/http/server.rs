//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, limits, request ID, no-store)
//! - Bind server to listener (plain or TLS)
//! - Apply hot-reloaded configuration
//! - Drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::header::{HeaderName, CACHE_CONTROL};
use axum::http::HeaderValue;
use axum::routing::{any, get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::{auth, health, proxy};
use crate::routing::RouteTable;
use crate::upstream::UpstreamApi;

/// Configuration-derived state, swapped as a whole on reload.
#[derive(Debug)]
pub struct RuntimeState {
    pub config: GatewayConfig,
    pub routes: RouteTable,
}

impl RuntimeState {
    pub fn new(config: GatewayConfig) -> Self {
        let routes = RouteTable::from_config(config.effective_routes());
        Self { config, routes }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ArcSwap<RuntimeState>>,
    pub upstream: Arc<dyn UpstreamApi>,
}

impl AppState {
    pub fn new(config: GatewayConfig, upstream: Arc<dyn UpstreamApi>) -> Self {
        Self {
            runtime: Arc::new(ArcSwap::from_pointee(RuntimeState::new(config))),
            upstream,
        }
    }

    /// Swap in a reloaded configuration.
    ///
    /// Routes, session and relay settings take effect immediately. Listener,
    /// upstream client, limits, timeouts and observability are fixed for the
    /// life of the process: their current values are kept, and the names of
    /// changed fields are returned.
    pub fn apply_config(&self, mut config: GatewayConfig) -> Vec<&'static str> {
        let current = self.runtime.load();
        let ignored = restart_only_changes(&current.config, &config);
        if !ignored.is_empty() {
            tracing::warn!(fields = ?ignored, "Reload ignores settings that require a restart");
        }

        config.listener = current.config.listener.clone();
        config.upstream = current.config.upstream.clone();
        config.security = current.config.security.clone();
        config.timeouts = current.config.timeouts.clone();
        config.observability = current.config.observability.clone();

        let next = RuntimeState::new(config);
        tracing::info!(routes = next.routes.len(), "Configuration reloaded");
        self.runtime.store(Arc::new(next));
        ignored
    }
}

fn restart_only_changes(current: &GatewayConfig, next: &GatewayConfig) -> Vec<&'static str> {
    let tls_paths = |c: &GatewayConfig| {
        c.listener
            .tls
            .as_ref()
            .map(|t| (t.cert_path.clone(), t.key_path.clone()))
    };

    [
        ("listener.bind_address", current.listener.bind_address != next.listener.bind_address),
        ("listener.tls", tls_paths(current) != tls_paths(next)),
        ("upstream.base_url", current.upstream.base_url != next.upstream.base_url),
        ("upstream.timeout_secs", current.upstream.timeout_secs != next.upstream.timeout_secs),
        ("security.max_body_size", current.security.max_body_size != next.security.max_body_size),
        ("timeouts.request_secs", current.timeouts.request_secs != next.timeouts.request_secs),
        ("observability.log_level", current.observability.log_level != next.observability.log_level),
        (
            "observability.metrics",
            current.observability.metrics_enabled != next.observability.metrics_enabled
                || current.observability.metrics_address != next.observability.metrics_address,
        ),
    ]
    .into_iter()
    .filter_map(|(field, changed)| changed.then_some(field))
    .collect()
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration and upstream.
    pub fn new(config: GatewayConfig, upstream: Arc<dyn UpstreamApi>) -> Self {
        let state = AppState::new(config.clone(), upstream);
        let router = Self::build_router(&config, state.clone());
        Self {
            router,
            config,
            state,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let router = Router::new()
            .route("/healthz", get(health::healthz))
            .route("/api/auth/login", post(auth::login))
            .route("/api/auth/logout", post(auth::logout))
            .route("/api/auth/refresh", post(auth::refresh))
            .route("/api/{*path}", any(proxy::api_handler))
            .fallback(proxy::not_found)
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(SetResponseHeaderLayer::overriding(
                CACHE_CONTROL,
                HeaderValue::from_static("no-store"),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

        // TLS terminates here, so the client-facing protocol is known.
        if config.listener.tls.is_some() {
            router.layer(SetRequestHeaderLayer::overriding(
                HeaderName::from_static("x-forwarded-proto"),
                HeaderValue::from_static("https"),
            ))
        } else {
            router
        }
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = spawn_reloader(self.state.clone(), config_updates);

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server with TLS termination.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let reloader = spawn_reloader(self.state.clone(), config_updates);
        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        reloader.abort();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

fn spawn_reloader(
    state: AppState,
    mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = config_updates.recv().await {
            state.apply_config(config);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AuthPolicy, RouteConfig};
    use crate::session::SessionTokens;
    use crate::upstream::{RefreshError, UpstreamError, UpstreamRequest, UpstreamResponse};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tower::ServiceExt;

    /// Upstream fake that only counts calls.
    #[derive(Default)]
    struct Counting {
        calls: AtomicU32,
    }

    impl Counting {
        fn tick(&self) -> UpstreamResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            UpstreamResponse::new(StatusCode::OK, json!({}))
        }
    }

    #[async_trait]
    impl UpstreamApi for Counting {
        async fn login(&self, _body: Value) -> Result<UpstreamResponse, UpstreamError> {
            Ok(self.tick())
        }

        async fn refresh(&self, _refresh_token: &str) -> Result<SessionTokens, RefreshError> {
            self.tick();
            Err(RefreshError::Rejected(StatusCode::UNAUTHORIZED))
        }

        async fn logout(&self, _bearer: Option<&str>) -> Result<UpstreamResponse, UpstreamError> {
            Ok(self.tick())
        }

        async fn forward(&self, _request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
            Ok(self.tick())
        }
    }

    #[test]
    fn test_apply_config_swaps_routes() {
        let config = GatewayConfig::default();
        let state = AppState::new(config.clone(), Arc::new(Counting::default()));
        let defaults = state.runtime.load().routes.len();

        let mut next = config.clone();
        next.routes = vec![RouteConfig::new("reports", "/api/reports", "/reports", AuthPolicy::Bearer)];
        state.apply_config(next);

        let runtime = state.runtime.load();
        assert_ne!(runtime.routes.len(), defaults);
        assert_eq!(runtime.config.routes.len(), 1);
        assert!(matches!(
            runtime.routes.match_request(&Method::GET, "/api/reports/daily"),
            crate::routing::RouteMatch::Matched { .. }
        ));
    }

    #[test]
    fn test_apply_config_keeps_restart_only_settings() {
        let config = GatewayConfig::default();
        let state = AppState::new(config.clone(), Arc::new(Counting::default()));

        let mut next = config.clone();
        next.security.max_body_size = 1024;
        next.timeouts.request_secs = 5;
        next.upstream.base_url = "http://elsewhere:8000".into();
        next.session.access_max_age_secs = 300;

        let ignored = state.apply_config(next);
        assert_eq!(
            ignored,
            vec!["upstream.base_url", "security.max_body_size", "timeouts.request_secs"]
        );

        let runtime = state.runtime.load();
        assert_eq!(runtime.config.security.max_body_size, config.security.max_body_size);
        assert_eq!(runtime.config.timeouts.request_secs, config.timeouts.request_secs);
        assert_eq!(runtime.config.upstream.base_url, config.upstream.base_url);
        assert_eq!(runtime.config.session.access_max_age_secs, 300);
    }

    #[tokio::test]
    async fn test_unauthenticated_request_never_leaves_gateway() {
        let upstream = Arc::new(Counting::default());
        let server = HttpServer::new(GatewayConfig::default(), upstream.clone());

        let response = server
            .router()
            .oneshot(Request::get("/api/coupons").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let mut config = GatewayConfig::default();
        let mut reports = RouteConfig::new("reports", "/api/reports", "/reports", AuthPolicy::Public);
        reports.methods = vec!["GET".into()];
        config.routes = vec![reports];
        let upstream = Arc::new(Counting::default());
        let server = HttpServer::new(config, upstream.clone());

        let response = server
            .router()
            .oneshot(Request::delete("/api/reports/1").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dot_segment_path_is_not_routed() {
        let upstream = Arc::new(Counting::default());
        let server = HttpServer::new(GatewayConfig::default(), upstream.clone());

        let response = server
            .router()
            .oneshot(Request::get("/api/password/../coupons").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let mut config = GatewayConfig::default();
        config.security.max_body_size = 16;
        let server = HttpServer::new(config, Arc::new(Counting::default()));

        let response = server
            .router()
            .oneshot(
                Request::post("/api/auth/login")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"someone@example.com","password":"x"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
