//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): finished requests by status
//! - `gateway_request_duration_seconds` (histogram): request latency
//! - `gateway_duplex_connections` (gauge): connections in the registry
//! - `gateway_duplex_events_total` (counter): duplex dispatches by outcome

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    ::metrics::counter!("gateway_requests_total", "status" => status.to_string()).increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

/// `outcome` is one of `accepted`, `rejected`, `closed`.
pub fn record_duplex_event(outcome: &'static str) {
    ::metrics::counter!("gateway_duplex_events_total", "outcome" => outcome).increment(1);
}

pub fn record_registry_size(size: usize) {
    ::metrics::gauge!("gateway_duplex_connections").set(size as f64);
}
