//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration (file, then environment)
//! - Initialize logging and the optional metrics exporter
//! - Build the upstream client and start the config watcher
//! - Bind the listener and serve until a shutdown signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::net::{AddrParseError, SocketAddr};
use std::path::Path;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{load_or_default, ConfigError, ConfigWatcher};
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::tls::load_tls_config;
use crate::observability::{logging, metrics};
use crate::upstream::{HttpUpstream, UpstreamApi, UpstreamError};

/// Fatal errors before or while serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid {field} '{address}': {source}")]
    Address {
        field: &'static str,
        address: String,
        #[source]
        source: AddrParseError,
    },
    #[error("upstream client error: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("config watcher error: {0}")]
    Watch(#[from] notify::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn parse_addr(field: &'static str, address: &str) -> Result<SocketAddr, StartupError> {
    address.parse().map_err(|source| StartupError::Address {
        field,
        address: address.to_string(),
        source,
    })
}

/// Run the gateway until SIGINT/SIGTERM.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = load_or_default(config_path)?;
    logging::init(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        upstream = %config.upstream.base_url,
        production = config.session.production,
        routes = config.effective_routes().len(),
        "console-gateway starting"
    );

    if config.observability.metrics_enabled {
        let addr = parse_addr("metrics_address", &config.observability.metrics_address)?;
        metrics::init_metrics(addr);
    }

    let upstream: Arc<dyn UpstreamApi> = Arc::new(HttpUpstream::new(&config.upstream)?);

    // The watcher handle must outlive the server.
    let (config_updates, _watcher) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if let Err(e) = signals::wait_for_shutdown().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signals");
        }
        shutdown.trigger();
    });

    let server = HttpServer::new(config.clone(), upstream);
    match &config.listener.tls {
        Some(tls) => {
            let addr = parse_addr("bind_address", &config.listener.bind_address)?;
            let rustls = load_tls_config(tls).await?;
            server.run_tls(addr, rustls, config_updates, server_shutdown).await?;
        }
        None => {
            let listener = TcpListener::bind(&config.listener.bind_address).await?;
            server.run(listener, config_updates, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
