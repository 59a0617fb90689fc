//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

use crate::sample::HealthSample;

/// Number of trailing samples kept verbatim in the report.
pub const RECENT_SAMPLE_LIMIT: usize = 10;

/// Aggregated view over a finished monitoring session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatistics {
    /// Total samples recorded.
    pub count: usize,
    /// Successful samples over total, in `[0, 1]`; 0 for an empty session.
    pub success_rate: f64,
    /// Mean latency across successful samples only.
    pub avg_latency_ms: f64,
    /// Bounded tail of the sample sequence for report readability.
    pub recent_samples: Vec<HealthSample>,
}

/// Summarize an immutable sample sequence. Pure function; never divides by
/// zero on an empty or all-failed session.
pub fn summarize(samples: &[HealthSample]) -> HealthStatistics {
    let count = samples.len();
    let successes: Vec<&HealthSample> = samples.iter().filter(|s| s.succeeded).collect();
    let success_rate = if count == 0 {
        0.0
    } else {
        successes.len() as f64 / count as f64
    };
    let avg_latency_ms = if successes.is_empty() {
        0.0
    } else {
        successes.iter().map(|s| s.latency_ms as f64).sum::<f64>() / successes.len() as f64
    };
    let tail_start = count.saturating_sub(RECENT_SAMPLE_LIMIT);
    HealthStatistics {
        count,
        success_rate,
        avg_latency_ms,
        recent_samples: samples[tail_start..].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(latency: u64) -> HealthSample {
        HealthSample::success("/health", latency, 200)
    }

    fn bad() -> HealthSample {
        HealthSample::failure("/health", 1500, None, "timed out")
    }

    #[test]
    fn empty_session_summarizes_to_zero() {
        let stats = summarize(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert!(stats.recent_samples.is_empty());
    }

    #[test]
    fn success_rate_stays_within_unit_interval() {
        let stats = summarize(&[ok(10), bad(), ok(20), bad()]);
        assert_eq!(stats.count, 4);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert!((0.0..=1.0).contains(&stats.success_rate));
    }

    #[test]
    fn latency_averages_successful_samples_only() {
        let stats = summarize(&[ok(10), bad(), ok(30)]);
        assert!((stats.avg_latency_ms - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn all_failed_session_has_zero_latency_average() {
        let stats = summarize(&[bad(), bad()]);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.avg_latency_ms, 0.0);
        assert_eq!(stats.count, 2);
    }

    #[test]
    fn recent_tail_is_bounded() {
        let samples: Vec<HealthSample> = (0..25).map(|i| ok(i)).collect();
        let stats = summarize(&samples);
        assert_eq!(stats.recent_samples.len(), RECENT_SAMPLE_LIMIT);
        assert_eq!(stats.recent_samples[0].latency_ms, 15);
        assert_eq!(stats.recent_samples[9].latency_ms, 24);
    }
}
