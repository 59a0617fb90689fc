//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use faultlab_common::config::ExperimentKind;

use crate::strategy::{FaultInjectionResult, FaultStrategy, StrategyContext};

/// Identifier recorded when the pod deletion went through.
pub const METHOD_POD_DELETE: &str = "pod-delete";

/// Deletes one running pod of the target workload with zero grace period.
/// Single method, no fallback; the cluster's controller is expected to
/// replace the pod, so there is nothing to restore.
#[derive(Debug, Default)]
pub struct PodFailureStrategy;

#[async_trait]
impl FaultStrategy for PodFailureStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::PodFailure
    }

    async fn inject(&self, ctx: &StrategyContext) -> Result<FaultInjectionResult> {
        let namespace = &ctx.experiment.namespace;
        let filter = &ctx.experiment.pod_label_filter;
        let pods = match ctx.cluster.list_pods(namespace).await {
            Ok(pods) => pods,
            Err(err) => {
                warn!(target: "faultlab::inject", error = %err, "pod listing failed");
                return Ok(FaultInjectionResult::all_failed(format!(
                    "unable to list pods: {err}"
                )));
            }
        };

        let Some(victim) = pods
            .iter()
            .find(|pod| pod.is_running() && pod.name.contains(filter.as_str()))
        else {
            return Ok(FaultInjectionResult::all_failed(format!(
                "no running pod matching '{filter}' in namespace '{namespace}'"
            )));
        };

        match ctx.cluster.delete_pod(namespace, &victim.name).await {
            Ok(()) => {
                info!(
                    target: "faultlab::inject",
                    pod = %victim.name,
                    namespace = %namespace,
                    "pod deleted with zero grace period"
                );
                Ok(FaultInjectionResult::applied(METHOD_POD_DELETE, Vec::new()))
            }
            Err(err) => {
                warn!(target: "faultlab::inject", pod = %victim.name, error = %err, "pod deletion failed");
                Ok(FaultInjectionResult::all_failed(format!(
                    "unable to delete pod {}: {err}",
                    victim.name
                )))
            }
        }
    }
}
