//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): requests by method, status, node
//! - `balancer_request_duration_seconds` (histogram): end-to-end latency
//! - `balancer_probes_total` (counter): probe outcomes by node
//! - `balancer_selection_cache_total` (counter): cache hits and misses
//! - `balancer_rate_limited_total` (counter): rejected by the limiter
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, node: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("node", node.to_string()),
    ];
    metrics::counter!("balancer_requests_total", &labels).increment(1);
    metrics::histogram!("balancer_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_probe(node: &str, outcome: &'static str) {
    metrics::counter!("balancer_probes_total", "node" => node.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("balancer_selection_cache_total", "result" => result).increment(1);
}

pub fn record_rate_limited() {
    metrics::counter!("balancer_rate_limited_total").increment(1);
}
