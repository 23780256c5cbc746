//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, route, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency by route
//! - `gateway_proxy_outcomes_total` (counter): pipeline outcomes by route and outcome
//! - `gateway_proxy_duration_seconds` (histogram): dispatch latency by route
//! - `gateway_token_store_size` (gauge): live access tokens
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Route labels are the matched route template, never the raw path

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its scrape listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!("gateway_requests_total", "Inbound requests handled");
    describe_histogram!("gateway_request_duration_seconds", "Inbound request latency in seconds");
    describe_counter!("gateway_proxy_outcomes_total", "Downstream pipeline outcomes");
    describe_histogram!("gateway_proxy_duration_seconds", "Downstream dispatch latency in seconds");
    describe_gauge!("gateway_token_store_size", "Access tokens currently stored");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one inbound request.
pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

/// Record one dispatch through the proxy pipeline.
pub fn record_proxy_outcome(route: &str, outcome: &str, started: Instant) {
    counter!(
        "gateway_proxy_outcomes_total",
        "route" => route.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("gateway_proxy_duration_seconds", "route" => route.to_string())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_token_store_size(size: usize) {
    gauge!("gateway_token_store_size").set(size as f64);
}
