//! Integration tests for the monitoring listener

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use hcloud_lib::api::router;
use hcloud_lib::{
    AgentMetrics, ClientError, GatherError, GatherReport, GatherSummary, HealthRegistry,
};
use std::time::Duration;
use tower::ServiceExt;

async fn get(health: &HealthRegistry, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router(health.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

fn round_with_failure(id: i64) -> GatherReport {
    let mut report = GatherReport::default();
    report.add(
        &GatherSummary {
            resources: 2,
            records: 4,
            errors: 1,
        },
        &[GatherError::FetchMetrics {
            id,
            source: ClientError::DeadlineExceeded(Duration::from_secs(5)),
        }],
    );
    report.finish()
}

#[tokio::test]
async fn test_healthz_healthy_before_first_round() {
    let health = HealthRegistry::default();

    let (status, body) = get(&health, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "healthy");
    assert!(body.get("last_gather").is_none());
}

#[tokio::test]
async fn test_healthz_reports_failing_load_balancers() {
    let health = HealthRegistry::default();
    health.record_gather(round_with_failure(4711)).await;

    let (status, body) = get(&health, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["last_gather"]["errors"], 1);
    assert_eq!(body["last_gather"]["records"], 4);
    assert_eq!(body["last_gather"]["failing_resources"][0], "1267");
}

#[tokio::test]
async fn test_healthz_503_after_output_failure() {
    let health = HealthRegistry::default();
    health.record_output_failure("Broken pipe").await;

    let (status, body) = get(&health, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body = json(&body);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["output_error"], "Broken pipe");
}

#[tokio::test]
async fn test_readyz_503_before_first_round() {
    let health = HealthRegistry::new(Some(Duration::from_secs(180)));

    let (status, body) = get(&health, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body = json(&body);
    assert_eq!(body["ready"], false);
    assert_eq!(body["reason"], "no gather round has completed");
}

#[tokio::test]
async fn test_readyz_reports_last_round() {
    let health = HealthRegistry::new(Some(Duration::from_secs(180)));
    health.record_gather(round_with_failure(1)).await;

    let (status, body) = get(&health, "/readyz").await;

    // Partial rounds still count as progress
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["ready"], true);
    assert_eq!(body["last_gather"]["collectors"], 1);
    assert_eq!(body["last_gather"]["resources"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_gather_counters() {
    let health = HealthRegistry::default();
    AgentMetrics::new().observe_gather(
        &GatherSummary {
            resources: 3,
            records: 6,
            errors: 0,
        },
        Duration::from_millis(80),
    );

    let (status, body) = get(&health, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("hcloud_agent_gather_cycles_total"));
    assert!(text.contains("hcloud_agent_records_emitted_total"));
    assert!(text.contains("hcloud_agent_gather_latency_seconds"));
}
