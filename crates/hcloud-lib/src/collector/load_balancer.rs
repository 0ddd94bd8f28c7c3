//! Load balancer records
//!
//! Each load balancer yields two records per cycle: a metadata record with
//! its static properties and a metrics record with the latest sample of each
//! tracked series.

use super::{deadline_after, Cycle};
use crate::accumulator::{FieldValue, Fields, Tags};
use crate::client::{with_deadline, ResourceClient};
use crate::error::GatherError;
use crate::models::{LoadBalancer, MetricType, MetricsWindow, TimeSeries};
use crate::series::{extract, Series};
use chrono::Utc;
use std::time::Duration;

/// Measurement carrying static load balancer properties
pub const LOAD_BALANCER_INFO: &str = "hcloud_load_balancer_info";

/// Measurement carrying load balancer metrics
pub const LOAD_BALANCER_METRICS: &str = "hcloud_load_balancer_metrics";

/// Tags of the metadata record
pub fn info_tags(lb: &LoadBalancer) -> Tags {
    Tags::from([
        ("id".to_string(), lb.hex_id()),
        ("name".to_string(), lb.name.clone()),
        ("location".to_string(), lb.location.name.clone()),
        ("type".to_string(), lb.load_balancer_type.name.clone()),
        ("protected".to_string(), lb.protection.delete.to_string()),
    ])
}

/// Fields of the metadata record
pub fn info_fields() -> Fields {
    Fields::from([("info".to_string(), FieldValue::Integer(1))])
}

/// Tags of the metrics record
pub fn metrics_tags(lb: &LoadBalancer) -> Tags {
    Tags::from([
        ("id".to_string(), lb.hex_id()),
        ("instance".to_string(), lb.name.clone()),
        ("type".to_string(), lb.load_balancer_type.name.clone()),
        ("datacenter".to_string(), lb.location.name.clone()),
    ])
}

/// Fields of the metrics record.
///
/// A series that fails to extract is left out and returned as an error;
/// the remaining series are unaffected.
pub fn metrics_fields(id: i64, series: &TimeSeries) -> (Fields, Vec<GatherError>) {
    let mut fields = Fields::new();
    let mut errors = Vec::new();

    for s in Series::ALL {
        match extract(series, s.name()) {
            Ok(value) => {
                fields.insert(s.field().to_string(), FieldValue::Float(value));
            }
            Err(source) => errors.push(GatherError::Extract { id, source }),
        }
    }

    (fields, errors)
}

/// List load balancers and emit their records
pub(super) async fn gather(client: &dyn ResourceClient, timeout: Duration, cycle: &mut Cycle<'_>) {
    let now = Utc::now();
    let window = MetricsWindow::snapshot(now);

    let deadline = deadline_after(timeout);
    let load_balancers = match with_deadline(deadline, client.list_load_balancers(deadline)).await
    {
        Ok(lbs) => lbs,
        Err(e) => {
            cycle.report(GatherError::ListResources(e));
            Vec::new()
        }
    };
    cycle.summary.resources += load_balancers.len();

    for lb in &load_balancers {
        cycle.emit(LOAD_BALANCER_INFO, info_fields(), info_tags(lb), now);

        let deadline = deadline_after(timeout);
        let series = match with_deadline(
            deadline,
            client.load_balancer_metrics(deadline, lb, &window, &MetricType::TRACKED),
        )
        .await
        {
            Ok(series) => series,
            Err(source) => {
                cycle.report(GatherError::FetchMetrics { id: lb.id, source });
                TimeSeries::new()
            }
        };

        let (fields, errors) = metrics_fields(lb.id, &series);
        for error in errors {
            cycle.report(error);
        }

        cycle.emit(LOAD_BALANCER_METRICS, fields, metrics_tags(lb), now);
    }
}
