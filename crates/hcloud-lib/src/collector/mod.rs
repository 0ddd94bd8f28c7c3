//! Gathering of Hetzner Cloud resources
//!
//! A [`Collector`] runs one gather cycle per call: list the resources of each
//! configured category, fetch their metrics, and hand metadata and metrics
//! records to an [`Accumulator`]. Errors never end a cycle early; each one is
//! reported to the accumulator and the cycle moves on.

mod load_balancer;


pub use load_balancer::{
    info_fields, info_tags, metrics_fields, metrics_tags, LOAD_BALANCER_INFO,
    LOAD_BALANCER_METRICS,
};

use crate::accumulator::{Accumulator, Fields, Tags};
use crate::client::{HcloudClient, ResourceClient, DEFAULT_ENDPOINT};
use crate::error::{ClientError, GatherError};
use crate::filter::{ResourceFilter, ResourceKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Default deadline for a single API call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration of one hcloud collector
#[derive(Clone, Serialize, Deserialize)]
pub struct HcloudConfig {
    /// Resource categories to poll; empty selects load balancers
    #[serde(default)]
    pub resources: Vec<String>,

    /// API token, sent as a bearer credential
    #[serde(default)]
    pub token: String,

    /// Deadline for each API call
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// API base URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for HcloudConfig {
    fn default() -> Self {
        Self {
            resources: Vec::new(),
            token: String::new(),
            timeout: default_timeout(),
            endpoint: default_endpoint(),
        }
    }
}

// Keep the token out of logs
impl fmt::Debug for HcloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HcloudConfig")
            .field("resources", &self.resources)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("timeout", &self.timeout)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Counts from one gather cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GatherSummary {
    /// Resources returned by the listings
    pub resources: usize,
    /// Records handed to the accumulator
    pub records: usize,
    /// Errors handed to the accumulator
    pub errors: usize,
}

/// Collector for the resources of one Hetzner Cloud project
pub struct Collector {
    config: HcloudConfig,
    filter: ResourceFilter,
    /// Created on first use and reused by every later cycle
    client: OnceCell<Arc<dyn ResourceClient>>,
}

impl Collector {
    /// Create a collector whose API client is built on the first gather
    pub fn new(config: HcloudConfig) -> Self {
        let filter = ResourceFilter::new(&config.resources);
        Self {
            config,
            filter,
            client: OnceCell::new(),
        }
    }

    /// Create a collector around an existing client
    pub fn with_client(config: HcloudConfig, client: Arc<dyn ResourceClient>) -> Self {
        let filter = ResourceFilter::new(&config.resources);
        Self {
            config,
            filter,
            client: OnceCell::new_with(Some(client)),
        }
    }

    pub fn config(&self) -> &HcloudConfig {
        &self.config
    }

    pub fn filter(&self) -> &ResourceFilter {
        &self.filter
    }

    /// Run one gather cycle
    pub async fn gather(&self, acc: &mut dyn Accumulator) -> GatherSummary {
        let mut cycle = Cycle {
            acc,
            summary: GatherSummary::default(),
        };

        let client = match self.client().await {
            Ok(client) => Arc::clone(client),
            Err(e) => {
                cycle.report(GatherError::Client(e));
                return cycle.summary;
            }
        };

        for kind in self.filter.kinds() {
            match kind {
                ResourceKind::LoadBalancers => {
                    load_balancer::gather(client.as_ref(), self.config.timeout, &mut cycle).await
                }
            }
        }

        debug!(
            resources = cycle.summary.resources,
            records = cycle.summary.records,
            errors = cycle.summary.errors,
            "Gather cycle complete"
        );

        cycle.summary
    }

    async fn client(&self) -> Result<&Arc<dyn ResourceClient>, ClientError> {
        self.client
            .get_or_try_init(|| async {
                debug!(endpoint = %self.config.endpoint, "Creating hcloud client");
                let client = HcloudClient::new(&self.config.endpoint, self.config.token.clone())?;
                Ok::<_, ClientError>(Arc::new(client) as Arc<dyn ResourceClient>)
            })
            .await
    }
}

/// Accumulator plus running counts for the cycle in progress
pub(crate) struct Cycle<'a> {
    acc: &'a mut dyn Accumulator,
    summary: GatherSummary,
}

impl Cycle<'_> {
    fn emit(
        &mut self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        timestamp: DateTime<Utc>,
    ) {
        self.summary.records += 1;
        self.acc.add_fields(measurement, fields, tags, timestamp);
    }

    fn report(&mut self, error: GatherError) {
        warn!(
            resource_id = ?error.resource_tag(),
            error = %error,
            "hcloud gather error"
        );
        self.summary.errors += 1;
        self.acc.add_error(error);
    }
}

/// Deadline for a call starting now
fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout
}
