//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dial_attempts_total` (counter): single attempts by `outcome`
//! - `dial_results_total` (counter): whole dial calls by `result`
//! - `dial_attempts_per_call` (histogram): attempts used per dial call
//! - `dial_duration_seconds` (histogram): wall time per dial call
//! - `transport_requests_total` (counter): routed requests by `transport`
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the outcome of one connect attempt.
pub fn record_dial_attempt(outcome: &'static str) {
    metrics::counter!("dial_attempts_total", "outcome" => outcome).increment(1);
}

/// Record the outcome of a whole dial call.
pub fn record_dial_result(result: &'static str, attempts: u32, started: Instant) {
    metrics::counter!("dial_results_total", "result" => result).increment(1);
    metrics::histogram!("dial_attempts_per_call", "result" => result).record(attempts as f64);
    metrics::histogram!("dial_duration_seconds", "result" => result)
        .record(started.elapsed().as_secs_f64());
}

/// Record which delegate a request was routed to.
pub fn record_transport_request(transport: &'static str) {
    metrics::counter!("transport_requests_total", "transport" => transport).increment(1);
}
