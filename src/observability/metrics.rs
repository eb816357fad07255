//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_token_refresh_total` (counter): refresh attempts by outcome
//! - `gateway_upstream_errors_total` (counter): transport/decoding failures
//! - `gateway_logout_total` (counter): logouts by upstream result
//!
//! # Design Decisions
//! - Recording functions are no-ops until `init_metrics` installs a recorder
//! - Labels are low-cardinality (route names, not paths)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a completed API request.
pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Record a refresh-token exchange.
pub fn record_refresh(outcome: &'static str) {
    metrics::counter!("gateway_token_refresh_total", "outcome" => outcome).increment(1);
}

/// Record an upstream call that produced no usable response.
pub fn record_upstream_error(operation: &'static str) {
    metrics::counter!("gateway_upstream_errors_total", "operation" => operation).increment(1);
}

/// Record a logout and how the upstream answered.
pub fn record_logout(upstream: &'static str) {
    metrics::counter!("gateway_logout_total", "upstream" => upstream).increment(1);
}
