//! Metrics collection and exposition.
//!
//! # Metrics
//! - `backstop_retry_outcomes_total` (counter): retry loop terminations by outcome
//! - `backstop_circuit_transitions_total` (counter): breaker transitions by state
//! - `backstop_circuit_rejections_total` (counter): calls failed fast while open
//! - `backstop_verify_outcomes_total` (counter): verification terminations by outcome
//! - `backstop_queue_depth` (gauge): items queued or awaiting requeue
//! - `backstop_queue_in_flight` (gauge): items currently processing
//! - `backstop_dead_letters_total` (counter): items dropped after exhausting retries

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install a Prometheus scrape endpoint at `addr`.
///
/// For applications that do not already run a `metrics` exporter. Failure
/// is logged and ignored; recording into an exporterless facade is a no-op.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "failed to install metrics exporter"),
    }
}

/// Record how a retry loop ended: success, retried, aborted, exhausted.
pub fn record_retry_outcome(outcome: &'static str) {
    metrics::counter!("backstop_retry_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record a breaker state transition.
pub fn record_circuit_transition(state: &'static str) {
    metrics::counter!("backstop_circuit_transitions_total", "state" => state).increment(1);
}

/// Record a call rejected while the circuit was open.
pub fn record_circuit_rejection() {
    metrics::counter!("backstop_circuit_rejections_total").increment(1);
}

/// Record how a verification ended: verified, timeout, read_failed.
pub fn record_verify_outcome(outcome: &'static str) {
    metrics::counter!("backstop_verify_outcomes_total", "outcome" => outcome).increment(1);
}

/// Record current queue depth and in-flight count.
pub fn record_queue_depth(queued: usize, in_flight: usize) {
    metrics::gauge!("backstop_queue_depth").set(queued as f64);
    metrics::gauge!("backstop_queue_in_flight").set(in_flight as f64);
}

/// Record an item dropped to the dead-letter hook.
pub fn record_dead_letter() {
    metrics::counter!("backstop_dead_letters_total").increment(1);
}
