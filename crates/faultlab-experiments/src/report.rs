//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use faultlab_common::config::ExperimentKind;
use faultlab_probe::{HealthStatistics, RecoveryOutcome};

use crate::strategy::FaultInjectionResult;

/// Metric blocks embedded in the final report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    /// Which fault method was applied and what it left behind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub injection: Option<FaultInjectionResult>,
    /// Aggregated health statistics over the monitoring session.
    pub health: HealthStatistics,
    /// Post-restore recovery outcome.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryOutcome>,
}

impl ReportMetrics {
    /// Metrics block for runs that failed before collecting anything.
    pub fn empty() -> Self {
        Self {
            injection: None,
            health: faultlab_probe::summarize(&[]),
            recovery: None,
        }
    }
}

/// The sole externally visible result of a run. Immutable once returned.
///
/// `success` means the run itself completed without an escalated failure;
/// it is deliberately independent of whether the target recovered. CI
/// pipelines and report renderers depend on these exact field names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentReport {
    /// Which experiment variant ran.
    pub experiment_type: String,
    /// Whether the run completed without an escalated failure.
    pub success: bool,
    /// Wall-clock duration of the whole run in milliseconds.
    pub duration_ms: u64,
    /// When the report was assembled (ISO 8601).
    pub timestamp: DateTime<Utc>,
    /// Injection, health, and recovery detail.
    pub metrics: ReportMetrics,
    /// Present only when `success` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExperimentReport {
    /// Assemble the report for a run that completed all phases.
    pub fn completed(kind: ExperimentKind, duration_ms: u64, metrics: ReportMetrics) -> Self {
        Self {
            experiment_type: kind.as_str().to_owned(),
            success: true,
            duration_ms,
            timestamp: Utc::now(),
            metrics,
            error: None,
        }
    }

    /// Assemble a terminal report for an escalated failure, carrying
    /// whatever partial metrics were collected before the failure.
    pub fn failed(
        kind: ExperimentKind,
        duration_ms: u64,
        error: impl Into<String>,
        metrics: ReportMetrics,
    ) -> Self {
        Self {
            experiment_type: kind.as_str().to_owned(),
            success: false,
            duration_ms,
            timestamp: Utc::now(),
            metrics,
            error: Some(error.into()),
        }
    }
}
