//! Agent health derived from gather outcomes
//!
//! The host records one [`GatherReport`] per gather round. Liveness follows
//! the latest round and the output pipe; readiness additionally requires the
//! latest round to be recent when a staleness bound is configured.

use crate::collector::GatherSummary;
use crate::error::GatherError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Last round completed without errors
    Healthy,
    /// Last round reported errors; records may be partial
    Degraded,
    /// Output to the parent process failed
    Unhealthy,
}

/// Outcome of one gather round across all collectors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherReport {
    pub completed_at: DateTime<Utc>,
    pub collectors: usize,
    pub resources: usize,
    pub records: usize,
    pub errors: usize,
    /// Tagged ids of load balancers with at least one error
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub failing_resources: BTreeSet<String>,
}

impl GatherReport {
    /// Fold one collector's cycle into the round
    pub fn add(&mut self, summary: &GatherSummary, errors: &[GatherError]) {
        self.collectors += 1;
        self.resources += summary.resources;
        self.records += summary.records;
        self.errors += summary.errors;
        self.failing_resources
            .extend(errors.iter().filter_map(GatherError::resource_tag));
    }

    /// Stamp the round as completed now
    pub fn finish(mut self) -> Self {
        self.completed_at = Utc::now();
        self
    }

    /// Age of the round at `now`; zero if `now` precedes it
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.completed_at).to_std().unwrap_or_default()
    }
}

/// Body of the liveness probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_gather: Option<GatherReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_error: Option<String>,
}

/// Body of the readiness probe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_gather: Option<GatherReport>,
}

#[derive(Debug, Default)]
struct State {
    last_gather: Option<GatherReport>,
    output_error: Option<String>,
}

/// Shared record of the latest gather round and output state
#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
    stale_after: Option<Duration>,
}

impl HealthRegistry {
    /// `stale_after` bounds the age of the last round for readiness; `None`
    /// accepts a round of any age.
    pub fn new(stale_after: Option<Duration>) -> Self {
        Self {
            state: Arc::default(),
            stale_after,
        }
    }

    pub async fn record_gather(&self, report: GatherReport) {
        self.state.write().await.last_gather = Some(report);
    }

    /// Output failures are terminal for the host, so they are never cleared
    pub async fn record_output_failure(&self, message: impl Into<String>) {
        self.state.write().await.output_error = Some(message.into());
    }

    pub async fn last_gather(&self) -> Option<GatherReport> {
        self.state.read().await.last_gather.clone()
    }

    pub async fn health(&self) -> HealthResponse {
        let state = self.state.read().await;

        let status = match (&state.output_error, &state.last_gather) {
            (Some(_), _) => HealthStatus::Unhealthy,
            (None, Some(report)) if report.errors > 0 => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        };

        HealthResponse {
            status,
            last_gather: state.last_gather.clone(),
            output_error: state.output_error.clone(),
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        self.readiness_at(Utc::now()).await
    }

    /// Readiness as of `now`
    pub async fn readiness_at(&self, now: DateTime<Utc>) -> ReadinessResponse {
        let state = self.state.read().await;

        let reason = match (&state.output_error, &state.last_gather) {
            (Some(e), _) => Some(format!("output failed: {e}")),
            (None, None) => Some("no gather round has completed".to_string()),
            (None, Some(report)) => self.stale_reason(report, now),
        };

        ReadinessResponse {
            ready: reason.is_none(),
            reason,
            last_gather: state.last_gather.clone(),
        }
    }

    fn stale_reason(&self, report: &GatherReport, now: DateTime<Utc>) -> Option<String> {
        let limit = self.stale_after?;
        let age = report.age(now);
        (age > limit).then(|| {
            format!(
                "last gather round completed {}s ago (limit {}s)",
                age.as_secs(),
                limit.as_secs()
            )
        })
    }
}
