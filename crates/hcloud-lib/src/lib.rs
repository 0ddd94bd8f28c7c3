//! Hetzner Cloud metrics polling library
//!
//! This crate provides the core functionality for:
//! - Listing Hetzner Cloud load balancers and querying their metrics
//! - Normalizing metric series into flat, tagged records
//! - Handing records and non-fatal errors to an accumulator
//! - Health checks and observability for the hosting agent

pub mod accumulator;
pub mod api;
pub mod client;
pub mod collector;
pub mod error;
pub mod filter;
pub mod health;
pub mod models;
pub mod observability;
pub mod series;

pub use accumulator::{Accumulator, BufferedAccumulator, FieldValue, Fields, Metric, Tags};
pub use collector::{Collector, GatherSummary, HcloudConfig};
pub use error::{ClientError, ExtractError, GatherError};
pub use filter::{ResourceFilter, ResourceKind};
pub use health::{GatherReport, HealthRegistry, HealthResponse, HealthStatus, ReadinessResponse};
pub use models::*;
pub use observability::{AgentMetrics, StructuredLogger};
