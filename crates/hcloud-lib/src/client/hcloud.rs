//! REST client for the Hetzner Cloud API

use super::{async_trait, with_deadline, ResourceClient};
use crate::error::ClientError;
use crate::models::{LoadBalancer, MetricType, MetricsValue, MetricsWindow, TimeSeries};
use chrono::SecondsFormat;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;
use tokio::time::Instant;
use tracing::debug;
use url::Url;

/// Public API base URL
pub const DEFAULT_ENDPOINT: &str = "https://api.hetzner.cloud/v1";

/// Page size requested when listing resources
const PAGE_SIZE: u32 = 50;

/// Hetzner Cloud API client authenticated with a bearer token
pub struct HcloudClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl HcloudClient {
    /// Create a new client for `endpoint`
    pub fn new(endpoint: &str, token: impl Into<String>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .user_agent(concat!("hcloud-telemetry/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Build)?;

        let mut base_url = Url::parse(endpoint)?;
        // Url::join drops the last segment unless the base ends with a slash
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Base URL requests are resolved against
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Make an authenticated GET request and decode the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = self.base_url.join(path)?;
        debug!(url = %url, "Requesting hcloud API");

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        Ok(serde_json::from_slice(&body)?)
    }

    async fn list_all_load_balancers(&self) -> Result<Vec<LoadBalancer>, ClientError> {
        let mut load_balancers = Vec::new();
        let mut page = 1u32;

        loop {
            let response: LoadBalancerList = self
                .get(
                    "load_balancers",
                    &[("page", page.to_string()), ("per_page", PAGE_SIZE.to_string())],
                )
                .await?;

            load_balancers.extend(response.load_balancers);

            match response.meta.pagination.and_then(|p| p.next_page) {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        debug!(count = load_balancers.len(), "Listed load balancers");
        Ok(load_balancers)
    }

    async fn fetch_metrics(
        &self,
        id: i64,
        window: &MetricsWindow,
        types: &[MetricType],
    ) -> Result<TimeSeries, ClientError> {
        let mut query: Vec<(&str, String)> = types
            .iter()
            .map(|t| ("type", t.as_str().to_string()))
            .collect();
        query.push(("start", window.start.to_rfc3339_opts(SecondsFormat::Secs, true)));
        query.push(("end", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)));
        query.push(("step", window.step.to_string()));

        let response: MetricsEnvelope = self
            .get(&format!("load_balancers/{id}/metrics"), &query)
            .await?;

        Ok(response
            .metrics
            .time_series
            .into_iter()
            .map(|(name, series)| (name, series.values))
            .collect())
    }
}

#[async_trait]
impl ResourceClient for HcloudClient {
    async fn list_load_balancers(
        &self,
        deadline: Instant,
    ) -> Result<Vec<LoadBalancer>, ClientError> {
        with_deadline(deadline, self.list_all_load_balancers()).await
    }

    async fn load_balancer_metrics(
        &self,
        deadline: Instant,
        load_balancer: &LoadBalancer,
        window: &MetricsWindow,
        types: &[MetricType],
    ) -> Result<TimeSeries, ClientError> {
        with_deadline(deadline, self.fetch_metrics(load_balancer.id, window, types)).await
    }
}

/// Build an API error from a non-success response
fn api_error(status: StatusCode, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => ClientError::Api {
            status: status.as_u16(),
            code: envelope.error.code,
            message: envelope.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_lowercase()
                .replace(' ', "_"),
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}

// API response types

#[derive(Debug, Deserialize)]
struct LoadBalancerList {
    load_balancers: Vec<LoadBalancer>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MetricsEnvelope {
    metrics: Metrics,
}

#[derive(Debug, Deserialize)]
struct Metrics {
    #[serde(default)]
    time_series: HashMap<String, SeriesValues>,
}

#[derive(Debug, Deserialize)]
struct SeriesValues {
    #[serde(default)]
    values: Vec<MetricsValue>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}
