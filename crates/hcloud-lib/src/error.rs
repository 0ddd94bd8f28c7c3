//! Error types for polling the Hetzner Cloud API

use crate::models::format_id;
use std::time::Duration;

/// Errors returned by a [`ResourceClient`](crate::client::ResourceClient) call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// The configured endpoint cannot be joined with a request path.
    #[error("invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The request could not be sent or the body could not be read.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error ({status}): {code}: {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The call did not finish before its deadline.
    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),
}

/// Errors from extracting a single series sample.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("invalid sample {value:?} in series {series}: {source}")]
    Parse {
        series: String,
        value: String,
        source: std::num::ParseFloatError,
    },

    #[error("non-finite sample {value:?} in series {series}")]
    NonFinite { series: String, value: String },
}

/// A non-fatal error reported during one gather cycle.
///
/// Carries the load balancer id where one applies so failures can be
/// correlated with the resource they belong to.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("failed to create hcloud client: {0}")]
    Client(#[source] ClientError),

    #[error("failed to list load balancers: {0}")]
    ListResources(#[source] ClientError),

    #[error("failed to fetch metrics for load balancer {}: {source}", tagged_id(.id))]
    FetchMetrics { id: i64, source: ClientError },

    #[error("load balancer {}: {source}", tagged_id(.id))]
    Extract { id: i64, source: ExtractError },
}

impl GatherError {
    /// Load balancer the error belongs to, if any
    pub fn resource_id(&self) -> Option<i64> {
        match self {
            GatherError::Client(_) | GatherError::ListResources(_) => None,
            GatherError::FetchMetrics { id, .. } | GatherError::Extract { id, .. } => Some(*id),
        }
    }

    /// Resource id as it appears in the `id` tag
    pub fn resource_tag(&self) -> Option<String> {
        self.resource_id().map(format_id)
    }
}

fn tagged_id(id: &i64) -> String {
    format_id(*id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_error_renders_tagged_id() {
        let err = GatherError::FetchMetrics {
            id: 4711,
            source: ClientError::DeadlineExceeded(Duration::from_secs(5)),
        };
        assert_eq!(err.resource_tag().as_deref(), Some("1267"));
        assert!(err.to_string().starts_with("failed to fetch metrics for load balancer 1267: "));

        let negative = GatherError::FetchMetrics {
            id: -255,
            source: ClientError::DeadlineExceeded(Duration::from_secs(5)),
        };
        assert_eq!(negative.resource_tag().as_deref(), Some("-ff"));
    }

    #[test]
    fn test_cycle_level_errors_have_no_resource() {
        let err = GatherError::ListResources(ClientError::DeadlineExceeded(Duration::from_secs(5)));
        assert_eq!(err.resource_id(), None);
        assert_eq!(err.resource_tag(), None);
    }
}
