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

use faultlab_cluster::StressPodSpec;
use faultlab_common::config::ExperimentKind;

use crate::strategy::{
    run_suffix, AppliedArtifact, FaultInjectionResult, FaultStrategy, StrategyContext,
};

/// Identifier recorded when stress pod creation was accepted.
pub const METHOD_STRESS_PODS: &str = "stress-pods";

/// Deploys short-lived pods that each request a fixed CPU/memory allocation
/// and actively consume it until their deadline. Injection counts as
/// successful once the creation requests are accepted; whether the pods
/// actually schedule is deliberately not confirmed.
#[derive(Debug, Default)]
pub struct ResourceExhaustionStrategy;

#[async_trait]
impl FaultStrategy for ResourceExhaustionStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::ResourceExhaustion
    }

    async fn inject(&self, ctx: &StrategyContext) -> Result<FaultInjectionResult> {
        let namespace = &ctx.experiment.namespace;
        let stress = &ctx.cluster_cfg.stress;
        let suffix = run_suffix();
        let mut accepted = Vec::new();
        let mut failures = Vec::new();

        for index in 0..stress.pod_count {
            let spec = StressPodSpec {
                name: format!("faultlab-stress-{index}-{suffix}"),
                image: stress.image.clone(),
                cpu: stress.cpu.clone(),
                memory: stress.memory.clone(),
                active_deadline: ctx.experiment.planned_duration,
            };
            match ctx.cluster.create_stress_pod(namespace, &spec).await {
                Ok(name) => {
                    info!(target: "faultlab::inject", pod = %name, cpu = %stress.cpu, memory = %stress.memory, "stress pod accepted");
                    accepted.push(name);
                }
                Err(err) => {
                    warn!(target: "faultlab::inject", pod = %spec.name, error = %err, "stress pod creation rejected");
                    failures.push(format!("{}: {err}", spec.name));
                }
            }
        }

        if accepted.is_empty() {
            return Ok(FaultInjectionResult::all_failed(format!(
                "no stress pod creation was accepted: {}",
                failures.join("; ")
            )));
        }

        let mut result = FaultInjectionResult::applied(
            METHOD_STRESS_PODS,
            vec![AppliedArtifact::StressPods {
                names: accepted.clone(),
            }],
        );
        if !failures.is_empty() {
            result = result.with_note(format!(
                "{} of {} stress pod creations rejected",
                failures.len(),
                stress.pod_count
            ));
        }
        Ok(result)
    }
}
