//! Metrics for agent round trips
//!
//! # Metrics
//!
//! - `enrollchat_agent_requests_total`: Counter of requests started
//! - `enrollchat_agent_failures_total`: Counter of failed requests by kind
//! - `enrollchat_agent_in_flight`: Gauge of outstanding requests
//! - `enrollchat_agent_request_duration_seconds`: Histogram of round-trip time
//!   labelled by outcome
//!
//! Nothing is exported unless a `metrics` recorder is installed; without
//! one every call is a no-op. Building with the `prometheus` feature makes
//! [`init_metrics_exporter`] install a Prometheus exporter.
//!
//! # Examples
//!
//! ```
//! use enrollchat::session::metrics::RequestMetrics;
//!
//! let metrics = RequestMetrics::start();
//! metrics.record_success();
//! ```

use metrics::{decrement_gauge, histogram, increment_counter, increment_gauge};
use std::cell::Cell;
use std::time::{Duration, Instant};

/// Metrics for one agent request.
///
/// The in-flight gauge is incremented on creation and decremented exactly
/// once, on the first `record_*` call or on drop.
#[derive(Debug)]
pub struct RequestMetrics {
    start: Instant,
    recorded: Cell<bool>,
}

impl RequestMetrics {
    /// Start tracking a request.
    pub fn start() -> Self {
        increment_counter!("enrollchat_agent_requests_total");
        increment_gauge!("enrollchat_agent_in_flight", 1.0);

        Self {
            start: Instant::now(),
            recorded: Cell::new(false),
        }
    }

    /// Record a reply from the agent.
    pub fn record_success(&self) {
        self.finish("success");
    }

    /// Record a failure; `kind` is the error kind label
    /// (see `EnrollchatError::kind`).
    pub fn record_failure(&self, kind: &str) {
        if self.recorded.get() {
            return;
        }
        increment_counter!(
            "enrollchat_agent_failures_total",
            "kind" => kind.to_string()
        );
        self.finish("failure");
    }

    /// Time since the request started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    fn finish(&self, outcome: &'static str) {
        if self.recorded.replace(true) {
            return;
        }
        histogram!(
            "enrollchat_agent_request_duration_seconds",
            self.start.elapsed().as_secs_f64(),
            "outcome" => outcome
        );
        decrement_gauge!("enrollchat_agent_in_flight", 1.0);
    }
}

impl Drop for RequestMetrics {
    fn drop(&mut self) {
        if !self.recorded.get() {
            self.finish("abandoned");
        }
    }
}

/// Install the Prometheus exporter when built with the `prometheus`
/// feature. Otherwise does nothing.
///
/// # Examples
///
/// ```
/// use enrollchat::session::metrics::init_metrics_exporter;
///
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        if let Err(e) = PrometheusBuilder::new().install() {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_success_marks_recorded() {
        let metrics = RequestMetrics::start();
        metrics.record_success();
        assert!(metrics.recorded.get());
        // Second call is ignored.
        metrics.record_failure("timeout");
        assert!(metrics.recorded.get());
    }

    #[test]
    fn test_record_failure_marks_recorded() {
        let metrics = RequestMetrics::start();
        metrics.record_failure("transport");
        assert!(metrics.recorded.get());
    }

    #[test]
    fn test_drop_without_record_does_not_panic() {
        let metrics = RequestMetrics::start();
        drop(metrics);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let metrics = RequestMetrics::start();
        let first = metrics.elapsed();
        assert!(metrics.elapsed() >= first);
    }
}
