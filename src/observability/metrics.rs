//! Metrics collection and exposition.
//!
//! # Metrics
//! - `frontend_connections_accepted_total` (counter)
//! - `frontend_accept_errors_total` (counter)
//! - `frontend_handoffs_total` (counter): labelled `outcome` = success | failure
//! - `frontend_channel_connects_total` (counter)
//! - `frontend_channel_disconnects_total` (counter)
//! - `frontend_channel_connected` (gauge): 1 while the worker channel is up
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_accept() {
    ::metrics::counter!("frontend_connections_accepted_total").increment(1);
}

pub fn record_accept_error() {
    ::metrics::counter!("frontend_accept_errors_total").increment(1);
}

pub fn record_handoff(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!("frontend_handoffs_total", "outcome" => outcome).increment(1);
}

pub fn record_channel_connected() {
    ::metrics::counter!("frontend_channel_connects_total").increment(1);
    ::metrics::gauge!("frontend_channel_connected").set(1.0);
}

pub fn record_channel_disconnected() {
    ::metrics::counter!("frontend_channel_disconnects_total").increment(1);
    ::metrics::gauge!("frontend_channel_connected").set(0.0);
}
