//! Metrics collection and export for ChatLoop.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use chatloop_core::PushReport;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const CONNECTIONS_TOTAL: &str = "chatloop_connections_total";
    pub const CONNECTIONS_ACTIVE: &str = "chatloop_connections_active";
    pub const ONLINE_IDENTITIES: &str = "chatloop_online_identities";
    pub const FRAMES_TOTAL: &str = "chatloop_frames_total";
    pub const FRAMES_BYTES: &str = "chatloop_frames_bytes";
    pub const MESSAGES_SENT: &str = "chatloop_messages_sent_total";
    pub const PUSHES_TOTAL: &str = "chatloop_pushes_total";
    pub const TYPING_TOTAL: &str = "chatloop_typing_events_total";
    pub const SEEN_MARKS_TOTAL: &str = "chatloop_seen_marks_total";
    pub const SEND_LATENCY_SECONDS: &str = "chatloop_send_latency_seconds";
    pub const ERRORS_TOTAL: &str = "chatloop_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(
        names::CONNECTIONS_TOTAL,
        "Total number of WebSocket connections since server start"
    );
    metrics::describe_gauge!(
        names::CONNECTIONS_ACTIVE,
        "Current number of open WebSocket connections"
    );
    metrics::describe_gauge!(
        names::ONLINE_IDENTITIES,
        "Identities with at least one open connection"
    );
    metrics::describe_counter!(names::FRAMES_TOTAL, "WebSocket frames by direction");
    metrics::describe_counter!(names::FRAMES_BYTES, "WebSocket frame bytes by direction");
    metrics::describe_counter!(names::MESSAGES_SENT, "Chat messages persisted");
    metrics::describe_counter!(
        names::PUSHES_TOTAL,
        "Realtime pushes by outcome (delivered or dropped)"
    );
    metrics::describe_counter!(names::TYPING_TOTAL, "Typing signals relayed");
    metrics::describe_counter!(names::SEEN_MARKS_TOTAL, "Seen marks by outcome");
    metrics::describe_histogram!(
        names::SEND_LATENCY_SECONDS,
        "Time from send request to persisted message in seconds"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Errors by type");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a new connection.
pub fn record_connection() {
    counter!(names::CONNECTIONS_TOTAL).increment(1);
    gauge!(names::CONNECTIONS_ACTIVE).increment(1.0);
}

/// Record a disconnection.
pub fn record_disconnection() {
    gauge!(names::CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Update the online identity count.
pub fn set_online_identities(count: usize) {
    gauge!(names::ONLINE_IDENTITIES).set(count as f64);
}

/// Record a WebSocket frame.
pub fn record_frame(bytes: usize, direction: &'static str) {
    counter!(names::FRAMES_TOTAL, "direction" => direction).increment(1);
    counter!(names::FRAMES_BYTES, "direction" => direction).increment(bytes as u64);
}

/// Record a persisted message and how long it took.
pub fn record_message_sent(seconds: f64) {
    counter!(names::MESSAGES_SENT).increment(1);
    histogram!(names::SEND_LATENCY_SECONDS).record(seconds);
}

/// Record the outcome of a fan-out.
pub fn record_push(report: PushReport) {
    counter!(names::PUSHES_TOTAL, "outcome" => "delivered").increment(report.delivered as u64);
    counter!(names::PUSHES_TOTAL, "outcome" => "dropped").increment(report.dropped as u64);
}

/// Record a relayed typing signal.
pub fn record_typing() {
    counter!(names::TYPING_TOTAL).increment(1);
}

/// Record a seen mark.
pub fn record_seen_mark(outcome: &'static str) {
    counter!(names::SEEN_MARKS_TOTAL, "outcome" => outcome).increment(1);
}

/// Record an error.
pub fn record_error(error_type: &'static str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type).increment(1);
}

/// Metrics guard that records disconnection on drop.
pub struct ConnectionMetricsGuard;

impl ConnectionMetricsGuard {
    /// Create a new metrics guard, recording a connection.
    #[must_use]
    pub fn new() -> Self {
        record_connection();
        Self
    }
}

impl Default for ConnectionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectionMetricsGuard {
    fn drop(&mut self) {
        record_disconnection();
    }
}
