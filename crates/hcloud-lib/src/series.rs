//! Series extraction
//!
//! Reduces a named series from a metrics response to a single `f64`.
//! A series that was never reported and a series reported without samples
//! both read as `0.0`; only samples that fail to parse are errors.

use crate::error::ExtractError;
use crate::models::TimeSeries;

/// Series reported by the load balancer metrics endpoint, with their field names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    BandwidthIn,
    BandwidthOut,
    ConnectionsPerSecond,
    OpenConnections,
    RequestsPerSecond,
}

impl Series {
    pub const ALL: [Series; 5] = [
        Series::BandwidthIn,
        Series::BandwidthOut,
        Series::ConnectionsPerSecond,
        Series::OpenConnections,
        Series::RequestsPerSecond,
    ];

    /// Key in the API's `time_series` object
    pub fn name(&self) -> &'static str {
        match self {
            Series::BandwidthIn => "bandwidth.in",
            Series::BandwidthOut => "bandwidth.out",
            Series::ConnectionsPerSecond => "connections_per_second",
            Series::OpenConnections => "open_connections",
            Series::RequestsPerSecond => "requests_per_second",
        }
    }

    /// Field name in the emitted metrics record
    pub fn field(&self) -> &'static str {
        match self {
            Series::BandwidthIn => "bandwidth_in",
            Series::BandwidthOut => "bandwidth_out",
            Series::ConnectionsPerSecond => "connections_per_second",
            Series::OpenConnections => "open_connections",
            Series::RequestsPerSecond => "requests_per_second",
        }
    }
}

/// Extract the latest sample of `name` from `series`.
pub fn extract(series: &TimeSeries, name: &str) -> Result<f64, ExtractError> {
    let Some(sample) = series.get(name).and_then(|values| values.last()) else {
        return Ok(0.0);
    };

    let value: f64 = sample
        .value
        .parse()
        .map_err(|source| ExtractError::Parse {
            series: name.to_string(),
            value: sample.value.clone(),
            source,
        })?;

    if !value.is_finite() {
        return Err(ExtractError::NonFinite {
            series: name.to_string(),
            value: sample.value.clone(),
        });
    }

    Ok(value)
}
