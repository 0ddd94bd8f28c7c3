//! Hetzner Cloud API access
//!
//! The collector only sees the [`ResourceClient`] trait. Every call takes the
//! deadline it must finish by; nothing here retries.

mod hcloud;

pub use hcloud::{HcloudClient, DEFAULT_ENDPOINT};

use crate::error::ClientError;
use crate::models::{LoadBalancer, MetricType, MetricsWindow, TimeSeries};
use std::future::Future;
use tokio::time::Instant;

pub use async_trait::async_trait;

/// Single-shot access to the resources and metrics of one project
#[async_trait]
pub trait ResourceClient: Send + Sync {
    /// List every load balancer visible to the token
    async fn list_load_balancers(&self, deadline: Instant)
        -> Result<Vec<LoadBalancer>, ClientError>;

    /// Fetch the requested metric types for one load balancer
    async fn load_balancer_metrics(
        &self,
        deadline: Instant,
        load_balancer: &LoadBalancer,
        window: &MetricsWindow,
        types: &[MetricType],
    ) -> Result<TimeSeries, ClientError>;
}

/// Run `fut` to completion or fail with [`ClientError::DeadlineExceeded`].
pub async fn with_deadline<F, T>(deadline: Instant, fut: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    let started = Instant::now();
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(ClientError::DeadlineExceeded(started.elapsed())),
    }
}
