//! Observability infrastructure for the hcloud agent
//!
//! Provides:
//! - Prometheus metrics (gather latency, records emitted, gather errors)
//! - Structured JSON logging with tracing

use crate::collector::GatherSummary;
use crate::error::GatherError;
use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for gather latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AgentMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AgentMetricsInner {
    gather_latency_seconds: Histogram,
    gather_cycles: IntCounter,
    records_emitted: IntCounter,
    gather_errors: IntCounter,
    load_balancers_listed: IntGauge,
}

impl AgentMetricsInner {
    fn new() -> Self {
        Self {
            gather_latency_seconds: register_histogram!(
                "hcloud_agent_gather_latency_seconds",
                "Time spent in one gather cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register gather_latency_seconds"),

            gather_cycles: register_int_counter!(
                "hcloud_agent_gather_cycles_total",
                "Total number of gather cycles run"
            )
            .expect("Failed to register gather_cycles"),

            records_emitted: register_int_counter!(
                "hcloud_agent_records_emitted_total",
                "Total number of records written to the sink"
            )
            .expect("Failed to register records_emitted"),

            gather_errors: register_int_counter!(
                "hcloud_agent_gather_errors_total",
                "Total number of non-fatal gather errors"
            )
            .expect("Failed to register gather_errors"),

            load_balancers_listed: register_int_gauge!(
                "hcloud_agent_load_balancers_listed",
                "Number of load balancers returned by the last listing"
            )
            .expect("Failed to register load_balancers_listed"),
        }
    }
}

/// Agent metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    _private: (),
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AgentMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AgentMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record the outcome of one gather cycle
    pub fn observe_gather(&self, summary: &GatherSummary, elapsed: Duration) {
        let inner = self.inner();
        inner.gather_latency_seconds.observe(elapsed.as_secs_f64());
        inner.gather_cycles.inc();
        inner.records_emitted.inc_by(summary.records as u64);
        inner.gather_errors.inc_by(summary.errors as u64);
        inner.load_balancers_listed.set(summary.resources as i64);
    }

    pub fn gather_cycles(&self) -> u64 {
        self.inner().gather_cycles.get()
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, collectors: usize, poll_interval: Option<Duration>) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            collectors = collectors,
            poll_interval_secs = ?poll_interval.map(|d| d.as_secs()),
            "hcloud agent started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "hcloud agent shutting down"
        );
    }

    /// Log a completed gather cycle
    pub fn log_gather(&self, collector: usize, summary: &GatherSummary, elapsed: Duration) {
        if summary.errors > 0 {
            warn!(
                event = "gather_completed",
                instance = %self.instance,
                collector = collector,
                resources = summary.resources,
                records = summary.records,
                errors = summary.errors,
                elapsed_ms = elapsed.as_millis() as u64,
                "Gather cycle completed with errors"
            );
        } else {
            info!(
                event = "gather_completed",
                instance = %self.instance,
                collector = collector,
                resources = summary.resources,
                records = summary.records,
                elapsed_ms = elapsed.as_millis() as u64,
                "Gather cycle completed"
            );
        }
    }

    /// Log an error reported by a gather cycle
    pub fn log_gather_error(&self, collector: usize, error: &GatherError) {
        warn!(
            event = "gather_error",
            instance = %self.instance,
            collector = collector,
            resource_id = ?error.resource_tag(),
            error = %error,
            "Gather error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_metrics_observe_gather() {
        let metrics = AgentMetrics::new();
        let before = metrics.gather_cycles();

        metrics.observe_gather(
            &GatherSummary {
                resources: 2,
                records: 4,
                errors: 1,
            },
            Duration::from_millis(120),
        );

        assert!(metrics.gather_cycles() > before);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-host");
        assert_eq!(logger.instance, "test-host");
    }
}
