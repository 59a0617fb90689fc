//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of a target endpoint. Immutable once recorded; failed
/// probes (timeouts, connection errors, non-2xx statuses) are recorded as
/// failed samples rather than dropped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    /// Wall-clock time the probe completed.
    pub timestamp: DateTime<Utc>,
    /// Endpoint path that was hit.
    pub endpoint: String,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
    /// HTTP status code when a response arrived at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    /// Whether the probe counts as healthy.
    pub succeeded: bool,
    /// Failure detail when the probe did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthSample {
    /// Construct a successful sample.
    pub fn success(endpoint: impl Into<String>, latency_ms: u64, http_status: u16) -> Self {
        Self {
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            latency_ms,
            http_status: Some(http_status),
            succeeded: true,
            error: None,
        }
    }

    /// Construct a failed sample, optionally carrying the status that came back.
    pub fn failure(
        endpoint: impl Into<String>,
        latency_ms: u64,
        http_status: Option<u16>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            endpoint: endpoint.into(),
            latency_ms,
            http_status,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}
