//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by `outcome` (forwarded, intercepted, failed)
//! - `relay_replays_total` (counter): replays sent to the origin, by `scheme`
//! - `relay_handshakes_total` (counter): interceptions by `scheme` and `outcome`
//! - `relay_active_connections` (gauge): current client connections
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus endpoint is opt-in (`observability.metrics_enabled`)

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::config::SchemeKind;

pub const REQUESTS_TOTAL: &str = "relay_requests_total";
pub const REPLAYS_TOTAL: &str = "relay_replays_total";
pub const HANDSHAKES_TOTAL: &str = "relay_handshakes_total";
pub const ACTIVE_CONNECTIONS: &str = "relay_active_connections";

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    ::metrics::describe_counter!(REQUESTS_TOTAL, "Client requests handled, by outcome");
    ::metrics::describe_counter!(REPLAYS_TOTAL, "Authenticated replays sent to the origin");
    ::metrics::describe_counter!(HANDSHAKES_TOTAL, "Intercepted challenges, by scheme and outcome");
    ::metrics::describe_gauge!(ACTIVE_CONNECTIONS, "Open client connections");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(outcome: &'static str) {
    ::metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_replays(scheme: SchemeKind, replays: u32) {
    ::metrics::counter!(REPLAYS_TOTAL, "scheme" => scheme.as_str()).increment(u64::from(replays));
}

pub fn record_handshake(scheme: SchemeKind, outcome: &'static str) {
    ::metrics::counter!(HANDSHAKES_TOTAL, "scheme" => scheme.as_str(), "outcome" => outcome).increment(1);
}

pub fn set_active_connections(count: u64) {
    ::metrics::gauge!(ACTIVE_CONNECTIONS).set(count as f64);
}
