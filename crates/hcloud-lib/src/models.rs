//! Core data models for the Hetzner Cloud load balancer API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Step size in seconds for metrics queries
pub const DEFAULT_METRIC_STEP: u32 = 60;

/// Load balancer snapshot as returned by the listing endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub id: i64,
    pub name: String,
    pub location: Location,
    pub load_balancer_type: LoadBalancerType,
    #[serde(default)]
    pub protection: Protection,
}

impl LoadBalancer {
    /// Identifier rendered the way it is tagged (lowercase hex)
    pub fn hex_id(&self) -> String {
        format_id(self.id)
    }
}

/// Signed lowercase hex; negative ids keep their sign instead of wrapping
pub fn format_id(id: i64) -> String {
    if id < 0 {
        format!("-{:x}", id.unsigned_abs())
    } else {
        format!("{id:x}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerType {
    pub name: String,
    #[serde(default)]
    pub max_connections: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Protection {
    #[serde(default)]
    pub delete: bool,
}

/// Metric types accepted by the load balancer metrics endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    OpenConnections,
    ConnectionsPerSecond,
    RequestsPerSecond,
    /// Reported as two series, `bandwidth.in` and `bandwidth.out`
    Bandwidth,
}

impl MetricType {
    /// The metric types queried on every cycle
    pub const TRACKED: [MetricType; 4] = [
        MetricType::OpenConnections,
        MetricType::ConnectionsPerSecond,
        MetricType::RequestsPerSecond,
        MetricType::Bandwidth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::OpenConnections => "open_connections",
            MetricType::ConnectionsPerSecond => "connections_per_second",
            MetricType::RequestsPerSecond => "requests_per_second",
            MetricType::Bandwidth => "bandwidth",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single sample, encoded by the API as `[timestamp, "value"]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "(f64, String)")]
pub struct MetricsValue {
    pub timestamp: f64,
    pub value: String,
}

impl From<(f64, String)> for MetricsValue {
    fn from((timestamp, value): (f64, String)) -> Self {
        Self { timestamp, value }
    }
}

impl MetricsValue {
    pub fn new(timestamp: f64, value: impl Into<String>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }
}

/// Series name to ordered samples, as returned for one query window
pub type TimeSeries = HashMap<String, Vec<MetricsValue>>;

/// Time window of a metrics query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Resolution in seconds
    pub step: u32,
}

impl MetricsWindow {
    /// Zero-width window anchored at `now`
    pub fn snapshot(now: DateTime<Utc>) -> Self {
        Self {
            start: now,
            end: now,
            step: DEFAULT_METRIC_STEP,
        }
    }
}
