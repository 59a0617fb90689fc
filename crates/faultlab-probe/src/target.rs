//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;

use faultlab_common::time::duration_to_millis;

use crate::sample::HealthSample;

/// Issues one bounded-timeout request against the target service and always
/// yields a [`HealthSample`], whatever the outcome. The monitor, the baseline
/// check, and the recovery detector all sit on top of this seam; tests swap
/// in scripted implementations.
#[async_trait]
pub trait TargetProber: Send + Sync {
    /// Probe one endpoint path with the supplied timeout.
    async fn probe(&self, endpoint: &str, timeout: Duration) -> HealthSample;
}

/// Production prober backed by reqwest. Timeouts are applied per request so
/// the same client serves both the short monitoring probes and the longer
/// baseline/recovery validation calls.
#[derive(Debug, Clone)]
pub struct HttpTargetProbe {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTargetProbe {
    /// Build a prober for the given target base URL.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("failed to construct target probe client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }
}

#[async_trait]
impl TargetProber for HttpTargetProbe {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> HealthSample {
        let url = format!("{}{}", self.base_url, endpoint);
        let started = Instant::now();
        match self.http.get(&url).timeout(timeout).send().await {
            Ok(response) => {
                let latency_ms = duration_to_millis(started.elapsed());
                let status = response.status();
                if status.is_success() {
                    HealthSample::success(endpoint, latency_ms, status.as_u16())
                } else {
                    HealthSample::failure(
                        endpoint,
                        latency_ms,
                        Some(status.as_u16()),
                        format!("unhealthy status {}", status.as_u16()),
                    )
                }
            }
            Err(err) => {
                let latency_ms = duration_to_millis(started.elapsed());
                HealthSample::failure(endpoint, latency_ms, None, err.to_string())
            }
        }
    }
}
