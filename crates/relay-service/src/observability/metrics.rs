//! Metrics definitions for the relay.
//!
//! All metrics follow Prometheus naming conventions:
//! - `relay_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! Labels are bounded by code: `result` (3 values), `reason` (4 values),
//! `operation` (issue, validate).

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Ticket backend latency buckets - Redis round trips
        .set_buckets_for_metric(
            Matcher::Prefix("relay_ticket".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set ticket latency buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus metrics recorder: {e}"))
}

// ============================================================================
// Connection Metrics
// ============================================================================

/// Set the number of registered connections.
///
/// Metric: `relay_connections_active`
pub fn set_connections_active(count: usize) {
    // usize to f64 conversion is safe for realistic connection counts (< 2^53)
    #[allow(clippy::cast_precision_loss)]
    gauge!("relay_connections_active").set(count as f64);
}

/// Record the outcome of an admission attempt.
///
/// Metric: `relay_admissions_total`
/// Labels: `result` (admitted, invalid_ticket, ticket_service_unavailable)
pub fn record_admission(result: &'static str) {
    counter!("relay_admissions_total", "result" => result).increment(1);
}

// ============================================================================
// Fan-out Metrics
// ============================================================================

/// Record one completed broadcast round.
///
/// Metrics: `relay_messages_broadcast_total`, `relay_fanout_deliveries_total`
pub fn record_broadcast(delivered: usize) {
    counter!("relay_messages_broadcast_total").increment(1);
    counter!("relay_fanout_deliveries_total").increment(delivered as u64);
}

/// Record a failed per-target send.
///
/// Metric: `relay_send_failures_total`
/// Labels: `reason` (queue_full, closed, timeout, other)
pub fn record_send_failure(reason: &'static str) {
    counter!("relay_send_failures_total", "reason" => reason).increment(1);
}

// ============================================================================
// Ticket Metrics
// ============================================================================

/// Record an issued ticket.
///
/// Metric: `relay_tickets_issued_total`
pub fn record_ticket_issued() {
    counter!("relay_tickets_issued_total").increment(1);
}

/// Record ticket backend latency.
///
/// Metric: `relay_ticket_latency_seconds`
/// Labels: `operation` (issue, validate)
pub fn record_ticket_latency(operation: &'static str, duration: Duration) {
    histogram!("relay_ticket_latency_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::capture::MetricsCapture;
    use super::*;

    #[test]
    fn test_connections_active_gauge() {
        let capture = MetricsCapture::new();

        capture.run(|| {
            set_connections_active(3);
            set_connections_active(1);
        });

        assert_eq!(capture.gauge("relay_connections_active"), Some(1.0));
    }

    #[test]
    fn test_admissions_labelled_by_result() {
        let capture = MetricsCapture::new();

        capture.run(|| {
            record_admission("admitted");
            record_admission("admitted");
            record_admission("invalid_ticket");
        });

        assert_eq!(
            capture.counter("relay_admissions_total", &[("result", "admitted")]),
            2
        );
        assert_eq!(
            capture.counter("relay_admissions_total", &[("result", "invalid_ticket")]),
            1
        );
        assert_eq!(
            capture.counter(
                "relay_admissions_total",
                &[("result", "ticket_service_unavailable")]
            ),
            0
        );
    }

    #[test]
    fn test_broadcast_counts_rounds_and_deliveries() {
        let capture = MetricsCapture::new();

        capture.run(|| {
            record_broadcast(0);
            record_broadcast(42);
            record_send_failure("queue_full");
        });

        assert_eq!(capture.counter("relay_messages_broadcast_total", &[]), 2);
        assert_eq!(capture.counter("relay_fanout_deliveries_total", &[]), 42);
        assert_eq!(
            capture.counter("relay_send_failures_total", &[("reason", "queue_full")]),
            1
        );
    }

    #[test]
    fn test_ticket_metrics() {
        let capture = MetricsCapture::new();

        capture.run(|| {
            record_ticket_issued();
            record_ticket_latency("issue", Duration::from_millis(2));
            record_ticket_latency("validate", Duration::from_micros(300));
            record_ticket_latency("validate", Duration::from_micros(400));
        });

        assert_eq!(capture.counter("relay_tickets_issued_total", &[]), 1);
        assert_eq!(
            capture.histogram_len("relay_ticket_latency_seconds", &[("operation", "validate")]),
            2
        );
    }
}
