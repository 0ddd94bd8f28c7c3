//! Sink for gathered records
//!
//! A gather cycle hands every record and every non-fatal error to an
//! [`Accumulator`]. The host decides what happens to them afterwards.

mod line_protocol;

pub use line_protocol::{encode, write_metrics};

use crate::error::GatherError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Value of a single record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

/// Field name to value, ordered by name
pub type Fields = BTreeMap<String, FieldValue>;

/// Tag key to value, ordered by key
pub type Tags = BTreeMap<String, String>;

/// One emitted record
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub fields: Fields,
    pub tags: Tags,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Receiver of gathered records and errors
pub trait Accumulator: Send {
    /// Record one measurement
    fn add_fields(
        &mut self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: DateTime<Utc>,
    );

    /// Report a non-fatal error; one call per failed sub-operation
    fn add_error(&mut self, error: GatherError);
}

/// Accumulator that keeps everything in memory until drained
#[derive(Debug, Default)]
pub struct BufferedAccumulator {
    metrics: Vec<Metric>,
    errors: Vec<GatherError>,
}

impl BufferedAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    pub fn errors(&self) -> &[GatherError] {
        &self.errors
    }

    /// Records with the given measurement name, in emission order
    pub fn measurements<'a>(&'a self, measurement: &'a str) -> impl Iterator<Item = &'a Metric> {
        self.metrics
            .iter()
            .filter(move |m| m.measurement == measurement)
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty() && self.errors.is_empty()
    }

    /// Take everything gathered so far, leaving the buffer empty
    pub fn drain(&mut self) -> (Vec<Metric>, Vec<GatherError>) {
        (
            std::mem::take(&mut self.metrics),
            std::mem::take(&mut self.errors),
        )
    }
}

impl Accumulator for BufferedAccumulator {
    fn add_fields(
        &mut self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: DateTime<Utc>,
    ) {
        self.metrics.push(Metric {
            measurement: measurement.to_string(),
            fields,
            tags,
            timestamp,
        });
    }

    fn add_error(&mut self, error: GatherError) {
        self.errors.push(error);
    }
}
