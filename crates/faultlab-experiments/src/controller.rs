//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use tracing::{error, info, warn};

use faultlab_cluster::ClusterControl;
use faultlab_common::config::{AppConfig, ExperimentKind};
use faultlab_common::time::{duration_to_millis, monotonic_now};
use faultlab_probe::{
    summarize, HealthMonitor, RecoveryDetector, RecoveryOutcome, TargetProber,
};

use crate::metrics::ExperimentMetrics;
use crate::report::{ExperimentReport, ReportMetrics};
use crate::strategy::{strategy_for, FaultInjectionResult, FaultStrategy, StrategyContext};

/// Hard ceiling on the hold phase regardless of configured duration.
const HOLD_CEILING: Duration = Duration::from_secs(180);
/// Portion of the planned duration spent holding the fault.
const HOLD_FRACTION: f64 = 0.6;

/// Sequences the six-phase experiment lifecycle and produces the terminal
/// [`ExperimentReport`]. `run` never returns an error: every escalated
/// failure is mapped into a report with `success = false` carrying the
/// elapsed duration and whatever partial metrics were collected.
pub struct ExperimentRunner {
    cluster: Arc<dyn ClusterControl>,
    prober: Arc<dyn TargetProber>,
    config: AppConfig,
    metrics: Option<ExperimentMetrics>,
}

impl ExperimentRunner {
    /// Build a runner over explicitly constructed collaborators.
    pub fn new(
        cluster: Arc<dyn ClusterControl>,
        prober: Arc<dyn TargetProber>,
        config: AppConfig,
    ) -> Self {
        Self {
            cluster,
            prober,
            config,
            metrics: None,
        }
    }

    /// Attach a prometheus metrics handle.
    pub fn with_metrics(mut self, metrics: ExperimentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn hold_duration(&self) -> Duration {
        self.config
            .experiment
            .planned_duration
            .mul_f64(HOLD_FRACTION)
            .min(HOLD_CEILING)
    }

    /// Recovery predicate endpoint for the configured variant: dependency
    /// faults are verified through the dependency-exercising endpoint, the
    /// rest through the generic health probe.
    fn recovery_endpoint(&self) -> &str {
        match self.config.experiment.kind {
            ExperimentKind::NetworkPartition | ExperimentKind::DatabaseFailure => {
                &self.config.experiment.dependency_endpoint
            }
            ExperimentKind::PodFailure | ExperimentKind::ResourceExhaustion => {
                &self.config.experiment.health_endpoint
            }
        }
    }

    /// Execute one experiment end to end.
    pub async fn run(&self) -> ExperimentReport {
        let kind = self.config.experiment.kind;
        let started = monotonic_now();
        info!(
            target: "faultlab::run",
            experiment = %kind,
            namespace = %self.config.experiment.namespace,
            planned_duration_s = self.config.experiment.planned_duration.as_secs(),
            "experiment starting"
        );

        // Phase 1: a target that is already unhealthy cannot be chaos-tested
        // meaningfully, so this is the one fatal precondition.
        let baseline = self
            .prober
            .probe(
                &self.config.experiment.health_endpoint,
                self.config.monitor.baseline_timeout,
            )
            .await;
        if !baseline.succeeded {
            let reason = baseline
                .error
                .unwrap_or_else(|| "no healthy response".to_owned());
            error!(target: "faultlab::run", experiment = %kind, reason = %reason, "baseline validation failed; aborting run");
            let report = ExperimentReport::failed(
                kind,
                duration_to_millis(started.elapsed()),
                format!("baseline validation failed: {reason}"),
                ReportMetrics::empty(),
            );
            if let Some(metrics) = &self.metrics {
                metrics.observe_run(kind, false);
            }
            return report;
        }

        // Phase 2: sampling runs for the remainder of the experiment,
        // independent of what the phases below are doing.
        let session = HealthMonitor::start(
            self.prober.clone(),
            vec![
                self.config.experiment.health_endpoint.clone(),
                self.config.experiment.dependency_endpoint.clone(),
            ],
            self.config.monitor.sample_interval,
            self.config.monitor.probe_timeout,
        );

        let strategy = strategy_for(kind);
        let ctx = StrategyContext {
            cluster: self.cluster.clone(),
            prober: self.prober.clone(),
            experiment: self.config.experiment.clone(),
            cluster_cfg: self.config.cluster.clone(),
        };
        let outcome = self.fault_phases(strategy.as_ref(), &ctx).await;

        // Phase 7: stop the monitor on both paths so partial samples always
        // reach the report.
        let samples = session.stop().await;
        if let Some(metrics) = &self.metrics {
            metrics.observe_samples(&samples);
        }
        let health = summarize(&samples);
        let duration_ms = duration_to_millis(started.elapsed());

        match outcome {
            Ok((injection, recovery)) => {
                if let Some(metrics) = &self.metrics {
                    metrics.observe_run(kind, true);
                    if recovery.recovered {
                        metrics.observe_recovery(
                            kind,
                            Duration::from_millis(recovery.elapsed_ms),
                        );
                    }
                }
                info!(
                    target: "faultlab::run",
                    experiment = %kind,
                    duration_ms,
                    method = %injection.method_used,
                    recovered = recovery.recovered,
                    samples = health.count,
                    "experiment completed"
                );
                ExperimentReport::completed(
                    kind,
                    duration_ms,
                    ReportMetrics {
                        injection: Some(injection),
                        health,
                        recovery: Some(recovery),
                    },
                )
            }
            Err(err) => {
                error!(target: "faultlab::run", experiment = %kind, error = %err, "experiment run failed");
                if let Some(metrics) = &self.metrics {
                    metrics.observe_run(kind, false);
                }
                ExperimentReport::failed(
                    kind,
                    duration_ms,
                    err.to_string(),
                    ReportMetrics {
                        injection: None,
                        health,
                        recovery: None,
                    },
                )
            }
        }
    }

    /// Phases 3 through 6. Per-method injection failures are absorbed by the
    /// strategy itself; only unexpected internal errors escalate here.
    async fn fault_phases(
        &self,
        strategy: &dyn FaultStrategy,
        ctx: &StrategyContext,
    ) -> Result<(FaultInjectionResult, RecoveryOutcome)> {
        let kind = self.config.experiment.kind;

        // Phase 3: the result is captured whether or not a method succeeded;
        // even a failed injection proceeds to the cleanup-safe phases.
        let injection = strategy.inject(ctx).await?;
        if let Some(metrics) = &self.metrics {
            metrics.observe_injection_method(kind, &injection.method_used);
        }
        if !injection.succeeded {
            warn!(
                target: "faultlab::run",
                experiment = %kind,
                error = injection.error.as_deref().unwrap_or("unknown"),
                "no injection method succeeded; continuing to observe and report"
            );
        }

        // Phase 4: let the fault manifest while the monitor keeps sampling.
        let hold = self.hold_duration();
        info!(
            target: "faultlab::run",
            experiment = %kind,
            hold_ms = duration_to_millis(hold),
            "holding while the fault is active"
        );
        sleep(hold).await;

        // Phase 5: best effort, never aborts the run.
        strategy.restore(ctx, &injection).await;

        // Phase 6.
        let detector = RecoveryDetector::new(
            self.config.monitor.recovery_poll_interval,
            self.config.monitor.baseline_timeout,
        );
        let recovery = detector
            .wait_for_recovery(
                self.prober.as_ref(),
                self.recovery_endpoint(),
                self.config.experiment.recovery_timeout,
                kind.recovery_sla(),
            )
            .await;

        Ok((injection, recovery))
    }
}

impl std::fmt::Debug for ExperimentRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentRunner")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
