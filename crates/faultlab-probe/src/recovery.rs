//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use faultlab_common::time::{duration_to_millis, monotonic_now};

use crate::target::TargetProber;

/// Result of waiting for the target to come back after fault removal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryOutcome {
    /// Whether a successful response was observed before the timeout.
    pub recovered: bool,
    /// Milliseconds until the first success, or the full timeout on failure.
    pub elapsed_ms: u64,
    /// Whether the recovery-time objective was missed. Informational only;
    /// breaching it never fails the run.
    pub exceeded_sla: bool,
}

/// Polls a recovery predicate endpoint until it succeeds or a timeout
/// elapses. The wait is bounded by the timeout plus at most one poll
/// interval.
#[derive(Debug, Clone)]
pub struct RecoveryDetector {
    poll_interval: Duration,
    probe_timeout: Duration,
}

impl RecoveryDetector {
    /// Build a detector with the supplied polling cadence and per-request
    /// validation timeout.
    pub fn new(poll_interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            poll_interval,
            probe_timeout,
        }
    }

    /// Wait for the predicate endpoint to return a successful response.
    pub async fn wait_for_recovery(
        &self,
        prober: &dyn TargetProber,
        endpoint: &str,
        timeout: Duration,
        sla: Duration,
    ) -> RecoveryOutcome {
        let started = monotonic_now();
        loop {
            // A probe started near the deadline gets only the remaining
            // window as its budget, keeping the total wait bounded by the
            // timeout plus one poll interval.
            let remaining = timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                warn!(
                    target: "faultlab::recovery",
                    endpoint,
                    timeout_ms = duration_to_millis(timeout),
                    "recovery window exhausted without a healthy response"
                );
                return RecoveryOutcome {
                    recovered: false,
                    elapsed_ms: duration_to_millis(timeout),
                    exceeded_sla: true,
                };
            }
            let sample = prober
                .probe(endpoint, self.probe_timeout.min(remaining))
                .await;
            let elapsed = started.elapsed();
            if sample.succeeded {
                let exceeded_sla = elapsed > sla;
                if exceeded_sla {
                    warn!(
                        target: "faultlab::recovery",
                        endpoint,
                        elapsed_ms = duration_to_millis(elapsed),
                        sla_ms = duration_to_millis(sla),
                        "target recovered outside the recovery-time objective"
                    );
                } else {
                    info!(
                        target: "faultlab::recovery",
                        endpoint,
                        elapsed_ms = duration_to_millis(elapsed),
                        "target recovered"
                    );
                }
                return RecoveryOutcome {
                    recovered: true,
                    elapsed_ms: duration_to_millis(elapsed),
                    exceeded_sla,
                };
            }
            if elapsed >= timeout {
                warn!(
                    target: "faultlab::recovery",
                    endpoint,
                    timeout_ms = duration_to_millis(timeout),
                    "recovery window exhausted without a healthy response"
                );
                return RecoveryOutcome {
                    recovered: false,
                    elapsed_ms: duration_to_millis(timeout),
                    exceeded_sla: true,
                };
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::HealthSample;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    struct RecoversAfter {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl TargetProber for RecoversAfter {
        async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                HealthSample::failure(endpoint, 1, Some(503), "unhealthy status 503")
            } else {
                HealthSample::success(endpoint, 1, 200)
            }
        }
    }

    #[tokio::test]
    async fn detects_recovery_after_a_few_failed_polls() {
        let prober = RecoversAfter {
            failures: 3,
            calls: AtomicU32::new(0),
        };
        let detector = RecoveryDetector::new(Duration::from_millis(5), Duration::from_millis(5));
        let outcome = detector
            .wait_for_recovery(
                &prober,
                "/api/products",
                Duration::from_millis(500),
                Duration::from_millis(500),
            )
            .await;
        assert!(outcome.recovered);
        assert!(!outcome.exceeded_sla);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn times_out_with_full_window_reported() {
        let prober = RecoversAfter {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let detector = RecoveryDetector::new(Duration::from_millis(5), Duration::from_millis(5));
        let started = Instant::now();
        let outcome = detector
            .wait_for_recovery(
                &prober,
                "/api/products",
                Duration::from_millis(40),
                Duration::from_millis(40),
            )
            .await;
        assert!(!outcome.recovered);
        assert!(outcome.exceeded_sla);
        assert_eq!(outcome.elapsed_ms, 40);
        // Bounded by timeout plus one poll interval (plus scheduling slack).
        assert!(started.elapsed() < Duration::from_millis(120));
    }

    /// Honours its timeout budget by sleeping through all of it, the way a
    /// request against a black-holed endpoint behaves.
    struct HungProber;

    #[async_trait]
    impl TargetProber for HungProber {
        async fn probe(&self, endpoint: &str, timeout: Duration) -> HealthSample {
            tokio::time::sleep(timeout).await;
            HealthSample::failure(
                endpoint,
                duration_to_millis(timeout),
                None,
                "timed out",
            )
        }
    }

    #[tokio::test]
    async fn probe_budget_is_capped_to_the_remaining_window() {
        // Per-request timeout (100 ms) is larger than the whole recovery
        // window (50 ms); the final probe must not drag the wait past it.
        let detector =
            RecoveryDetector::new(Duration::from_millis(10), Duration::from_millis(100));
        let started = Instant::now();
        let outcome = detector
            .wait_for_recovery(
                &HungProber,
                "/health",
                Duration::from_millis(50),
                Duration::from_millis(50),
            )
            .await;
        assert!(!outcome.recovered);
        assert_eq!(outcome.elapsed_ms, 50);
        assert!(
            started.elapsed() < Duration::from_millis(90),
            "waited {:?}, exceeding timeout + one poll interval",
            started.elapsed()
        );
    }

    #[tokio::test]
    async fn slow_recovery_sets_the_sla_flag_only() {
        let prober = RecoversAfter {
            failures: 4,
            calls: AtomicU32::new(0),
        };
        let detector = RecoveryDetector::new(Duration::from_millis(10), Duration::from_millis(5));
        let outcome = detector
            .wait_for_recovery(
                &prober,
                "/api/products",
                Duration::from_millis(500),
                Duration::from_millis(1),
            )
            .await;
        assert!(outcome.recovered);
        assert!(outcome.exceeded_sla);
    }
}
