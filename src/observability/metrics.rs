//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ws_connections_accepted_total` (counter)
//! - `ws_connections_rejected_total` (counter): accepts refused at the connection limit
//! - `ws_connections_closed_total` (counter)
//! - `ws_connections_active` (gauge)
//! - `ws_accept_errors_total` (counter)
//! - `ws_handshakes_total` (counter, labels: variant, outcome)
//! - `ws_messages_dispatched_total` (counter)
//! - `ws_frames_sent_total` (counter)
//! - `ws_send_failures_total` (counter)
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const CONNECTIONS_ACCEPTED_TOTAL: &str = "ws_connections_accepted_total";
pub const CONNECTIONS_REJECTED_TOTAL: &str = "ws_connections_rejected_total";
pub const CONNECTIONS_CLOSED_TOTAL: &str = "ws_connections_closed_total";
pub const CONNECTIONS_ACTIVE: &str = "ws_connections_active";
pub const ACCEPT_ERRORS_TOTAL: &str = "ws_accept_errors_total";
pub const HANDSHAKES_TOTAL: &str = "ws_handshakes_total";
pub const MESSAGES_DISPATCHED_TOTAL: &str = "ws_messages_dispatched_total";
pub const FRAMES_SENT_TOTAL: &str = "ws_frames_sent_total";
pub const SEND_FAILURES_TOTAL: &str = "ws_send_failures_total";

/// Install the global Prometheus recorder and serve it on `addr`.
///
/// Must be called once, from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    counter!(CONNECTIONS_ACCEPTED_TOTAL).increment(1);
}

pub fn record_connection_rejected() {
    counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
}

pub fn record_connection_closed() {
    counter!(CONNECTIONS_CLOSED_TOTAL).increment(1);
}

pub fn record_active_connections(count: usize) {
    gauge!(CONNECTIONS_ACTIVE).set(count as f64);
}

pub fn record_accept_error() {
    counter!(ACCEPT_ERRORS_TOTAL).increment(1);
}

pub fn record_handshake(variant: &'static str) {
    counter!(HANDSHAKES_TOTAL, "variant" => variant, "outcome" => "ok").increment(1);
}

pub fn record_handshake_failure() {
    counter!(HANDSHAKES_TOTAL, "variant" => "keyed", "outcome" => "failed").increment(1);
}

pub fn record_message_dispatched() {
    counter!(MESSAGES_DISPATCHED_TOTAL).increment(1);
}

pub fn record_frame_sent() {
    counter!(FRAMES_SENT_TOTAL).increment(1);
}

pub fn record_send_failure() {
    counter!(SEND_FAILURES_TOTAL).increment(1);
}
