//! Metrics collection and export for the issuance service.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const TOKENS_ISSUED_TOTAL: &str = "banter_tokens_issued_total";
    pub const ISSUANCE_FAILURES_TOTAL: &str = "banter_issuance_failures_total";
    pub const ISSUANCE_SECONDS: &str = "banter_issuance_seconds";
    pub const REQUESTS_ACTIVE: &str = "banter_requests_active";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::TOKENS_ISSUED_TOTAL,
        "Total number of credentials issued since start"
    );
    metrics::describe_counter!(
        names::ISSUANCE_FAILURES_TOTAL,
        "Total number of failed issuance requests"
    );
    metrics::describe_histogram!(
        names::ISSUANCE_SECONDS,
        "Issuance latency in seconds, including the upstream signing call"
    );
    metrics::describe_gauge!(
        names::REQUESTS_ACTIVE,
        "Current number of in-flight token requests"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a successful issuance.
pub fn record_token_issued() {
    counter!(names::TOKENS_ISSUED_TOTAL).increment(1);
}

/// Record a failed issuance.
pub fn record_issuance_failure(reason: &str) {
    counter!(names::ISSUANCE_FAILURES_TOTAL, "reason" => reason.to_string()).increment(1);
}

/// Record issuance latency.
pub fn record_issuance_latency(seconds: f64) {
    histogram!(names::ISSUANCE_SECONDS).record(seconds);
}

/// Guard that tracks an in-flight token request.
pub struct RequestMetricsGuard;

impl RequestMetricsGuard {
    /// Create a new guard, marking a request in flight.
    #[must_use]
    pub fn new() -> Self {
        gauge!(names::REQUESTS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for RequestMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RequestMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::REQUESTS_ACTIVE).decrement(1.0);
    }
}
