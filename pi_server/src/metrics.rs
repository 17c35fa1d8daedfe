//! Prometheus metrics for the classroom server.
//!
//! When `METRICS_BIND` is configured, the exporter serves the counters below
//! in Prometheus text format at `http://<addr>/metrics`. Without an installed
//! exporter the recording calls are no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pi_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", 200);
//! metrics::signin_attempts_total(true);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// # Arguments
///
/// - `addr`: Address to bind the metrics server to (e.g., `0.0.0.0:9090`)
///
/// # Returns
///
/// Result indicating success or error message
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
///
/// Labelled by method and status only; paths carry ids.
pub fn http_requests_total(method: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

// ============================================================================
// Auth Metrics
// ============================================================================

/// Increment sign-in attempts counter.
pub fn signin_attempts_total(success: bool) {
    metrics::counter!("signin_attempts_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment token refresh counter.
pub fn token_refresh_total(success: bool) {
    metrics::counter!("token_refresh_total",
        "success" => success.to_string()
    )
    .increment(1);
}

/// Increment completed sign-ups counter.
pub fn signups_total() {
    metrics::counter!("signups_total").increment(1);
}

// ============================================================================
// Class Metrics
// ============================================================================

/// Increment join code redemptions counter.
pub fn join_code_redemptions_total(success: bool) {
    metrics::counter!("join_code_redemptions_total",
        "success" => success.to_string()
    )
    .increment(1);
}
