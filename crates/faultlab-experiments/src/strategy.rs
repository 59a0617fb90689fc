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
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use faultlab_cluster::{ClusterControl, ClusterError};
use faultlab_common::config::{ClusterConfig, ExperimentConfig, ExperimentKind};
use faultlab_probe::TargetProber;

use crate::database_failure::DatabaseFailureStrategy;
use crate::network_partition::NetworkPartitionStrategy;
use crate::pod_failure::PodFailureStrategy;
use crate::resource_exhaustion::ResourceExhaustionStrategy;

/// `methodUsed` value reported when every fallback method was exhausted.
pub const METHOD_ALL_FAILED: &str = "all-failed";

/// Everything a strategy needs for one run: explicitly constructed
/// collaborators threaded through from the runner, never process-wide state.
#[derive(Clone)]
pub struct StrategyContext {
    /// Cluster control API used for injection and restoration.
    pub cluster: Arc<dyn ClusterControl>,
    /// Target service prober, used by the connection-overload fallback.
    pub prober: Arc<dyn TargetProber>,
    /// Per-run experiment parameters.
    pub experiment: ExperimentConfig,
    /// Cluster-side knobs (deployment names, ports, stress sizing).
    pub cluster_cfg: ClusterConfig,
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContext")
            .field("experiment", &self.experiment)
            .field("cluster_cfg", &self.cluster_cfg)
            .finish_non_exhaustive()
    }
}

/// Opaque handle recorded at injection time so restoration can reverse the
/// fault later. Restoration consumes these read-only; the injection result
/// itself is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AppliedArtifact {
    /// A created network-isolation rule, deletable by name.
    NetworkRule {
        /// Rule name in the target namespace.
        name: String,
    },
    /// A deployment scaled away from its original replica count.
    ReplicaCount {
        /// Deployment that was patched.
        deployment: String,
        /// Replica count captured before the patch.
        original_replicas: i32,
    },
    /// Stress pods created for resource exhaustion.
    StressPods {
        /// Names of the accepted pod creations.
        names: Vec<String>,
    },
    /// Connection saturation has no explicit undo; restoration cools down.
    ConnectionSaturation,
}

/// Outcome of applying a fault. Created once by a strategy's `inject`,
/// consumed read-only by its `restore`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjectionResult {
    /// Identifier of the fallback method that succeeded, or `all-failed`.
    pub method_used: String,
    /// Whether any method applied the fault.
    pub succeeded: bool,
    /// Handles needed later for restoration; empty when nothing to undo.
    pub applied_artifacts: Vec<AppliedArtifact>,
    /// Failure detail when no method succeeded, or a partial-success note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FaultInjectionResult {
    /// Build a successful result for the given method.
    pub fn applied(method: impl Into<String>, artifacts: Vec<AppliedArtifact>) -> Self {
        Self {
            method_used: method.into(),
            succeeded: true,
            applied_artifacts: artifacts,
            error: None,
        }
    }

    /// Build the terminal result after exhausting every fallback method.
    pub fn all_failed(error: impl Into<String>) -> Self {
        Self {
            method_used: METHOD_ALL_FAILED.to_owned(),
            succeeded: false,
            applied_artifacts: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Attach a non-fatal note (e.g. partially accepted stress pods).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.error = Some(note.into());
        self
    }
}

/// Variant-specific fault logic behind one `{inject, restore}` contract.
///
/// `inject` tries the variant's ordered fallback methods until one succeeds,
/// absorbing per-method failures; it only returns `Err` for genuinely
/// unexpected internal failures, which the runner turns into a failed
/// report. `restore` is best-effort and never propagates errors.
#[async_trait]
pub trait FaultStrategy: Send + Sync {
    /// Which experiment variant this strategy implements.
    fn kind(&self) -> ExperimentKind;

    /// Apply the fault, returning which method (if any) succeeded.
    async fn inject(&self, ctx: &StrategyContext) -> Result<FaultInjectionResult>;

    /// Reverse whatever `applied_artifacts` were recorded. Idempotent-safe:
    /// an empty artifact list is a no-op.
    async fn restore(&self, ctx: &StrategyContext, result: &FaultInjectionResult) {
        restore_artifacts(ctx, result).await;
    }
}

/// Select the strategy implementing the configured experiment variant.
pub fn strategy_for(kind: ExperimentKind) -> Box<dyn FaultStrategy> {
    match kind {
        ExperimentKind::PodFailure => Box::new(PodFailureStrategy),
        ExperimentKind::NetworkPartition => Box::new(NetworkPartitionStrategy),
        ExperimentKind::ResourceExhaustion => Box::new(ResourceExhaustionStrategy),
        ExperimentKind::DatabaseFailure => Box::new(DatabaseFailureStrategy),
    }
}

/// Fixed upper bound on the connection-saturation cool-down.
const MAX_COOL_DOWN: Duration = Duration::from_secs(5);

fn cool_down_duration(experiment: &ExperimentConfig) -> Duration {
    experiment.planned_duration.div_f64(10.0).min(MAX_COOL_DOWN)
}

/// Shared restoration walk over recorded artifacts. Failures are logged and
/// swallowed so the run can still report what happened.
pub(crate) async fn restore_artifacts(ctx: &StrategyContext, result: &FaultInjectionResult) {
    if result.applied_artifacts.is_empty() {
        info!(
            target: "faultlab::restore",
            method = %result.method_used,
            "nothing to restore"
        );
        return;
    }
    for artifact in &result.applied_artifacts {
        match artifact {
            AppliedArtifact::NetworkRule { name } => {
                match ctx
                    .cluster
                    .delete_network_rule(&ctx.experiment.namespace, name)
                    .await
                {
                    Ok(()) => info!(target: "faultlab::restore", rule = %name, "network rule deleted"),
                    Err(ClusterError::NotFound { .. }) => {
                        info!(target: "faultlab::restore", rule = %name, "network rule already gone")
                    }
                    Err(err) => {
                        warn!(target: "faultlab::restore", rule = %name, error = %err, "failed to delete network rule")
                    }
                }
            }
            AppliedArtifact::ReplicaCount {
                deployment,
                original_replicas,
            } => {
                match ctx
                    .cluster
                    .scale_deployment(&ctx.experiment.namespace, deployment, *original_replicas)
                    .await
                {
                    Ok(()) => info!(
                        target: "faultlab::restore",
                        deployment = %deployment,
                        replicas = original_replicas,
                        "deployment scaled back"
                    ),
                    Err(err) => warn!(
                        target: "faultlab::restore",
                        deployment = %deployment,
                        error = %err,
                        "failed to scale deployment back"
                    ),
                }
            }
            AppliedArtifact::StressPods { names } => {
                for name in names {
                    match ctx.cluster.delete_pod(&ctx.experiment.namespace, name).await {
                        Ok(()) => info!(target: "faultlab::restore", pod = %name, "stress pod deleted"),
                        Err(ClusterError::NotFound { .. }) => {
                            info!(target: "faultlab::restore", pod = %name, "stress pod already reaped")
                        }
                        Err(err) => {
                            warn!(target: "faultlab::restore", pod = %name, error = %err, "failed to delete stress pod")
                        }
                    }
                }
            }
            AppliedArtifact::ConnectionSaturation => {
                let cool_down = cool_down_duration(&ctx.experiment);
                info!(
                    target: "faultlab::restore",
                    cool_down_ms = cool_down.as_millis() as u64,
                    "connection saturation has no explicit undo; cooling down"
                );
                sleep(cool_down).await;
            }
        }
    }
}

/// Short random suffix keeping created resource names collision-free across
/// repeated runs.
pub(crate) fn run_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_failed_result_has_no_artifacts() {
        let result = FaultInjectionResult::all_failed("every method denied");
        assert_eq!(result.method_used, METHOD_ALL_FAILED);
        assert!(!result.succeeded);
        assert!(result.applied_artifacts.is_empty());
        assert!(result.error.is_some());
    }

    #[test]
    fn artifacts_serialize_tagged() {
        let artifact = AppliedArtifact::ReplicaCount {
            deployment: "postgres".into(),
            original_replicas: 2,
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["kind"], "replicaCount");
        assert_eq!(value["originalReplicas"], 2);
    }

    #[test]
    fn suffixes_are_short_and_unique() {
        let a = run_suffix();
        let b = run_suffix();
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn cool_down_scales_with_short_experiments() {
        let mut experiment = ExperimentConfig::default();
        experiment.planned_duration = Duration::from_secs(1);
        assert_eq!(cool_down_duration(&experiment), Duration::from_millis(100));
        experiment.planned_duration = Duration::from_secs(600);
        assert_eq!(cool_down_duration(&experiment), MAX_COOL_DOWN);
    }

    #[test]
    fn strategy_selection_matches_kind() {
        for kind in [
            ExperimentKind::PodFailure,
            ExperimentKind::NetworkPartition,
            ExperimentKind::ResourceExhaustion,
            ExperimentKind::DatabaseFailure,
        ] {
            assert_eq!(strategy_for(kind).kind(), kind);
        }
    }
}
