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

use faultlab_cluster::NetworkRuleSpec;
use faultlab_common::config::ExperimentKind;

use crate::strategy::{
    run_suffix, AppliedArtifact, FaultInjectionResult, FaultStrategy, StrategyContext,
};

/// Identifier for a real network-isolation rule.
pub const METHOD_NETWORK_RULE: &str = "network-policy";
/// Identifier for the degraded, log-only fallback.
pub const METHOD_SIMULATED: &str = "simulated-partition";

/// Blocks egress from the target's pods towards the dependency port. When
/// the isolation API is unavailable the strategy degrades to a simulated
/// marker that only records intent; degraded, but never fatal.
#[derive(Debug, Default)]
pub struct NetworkPartitionStrategy;

#[async_trait]
impl FaultStrategy for NetworkPartitionStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::NetworkPartition
    }

    async fn inject(&self, ctx: &StrategyContext) -> Result<FaultInjectionResult> {
        let namespace = &ctx.experiment.namespace;
        let spec = NetworkRuleSpec {
            name: format!("faultlab-partition-{}", run_suffix()),
            app_selector: ctx.experiment.pod_label_filter.clone(),
            blocked_port: ctx.cluster_cfg.dependency_port,
        };
        match ctx.cluster.create_network_rule(namespace, &spec).await {
            Ok(name) => {
                info!(
                    target: "faultlab::inject",
                    rule = %name,
                    blocked_port = spec.blocked_port,
                    "network-isolation rule created"
                );
                Ok(FaultInjectionResult::applied(
                    METHOD_NETWORK_RULE,
                    vec![AppliedArtifact::NetworkRule { name }],
                ))
            }
            Err(err) => {
                warn!(
                    target: "faultlab::inject",
                    error = %err,
                    blocked_port = spec.blocked_port,
                    selector = %spec.app_selector,
                    "isolation API unavailable; simulating partition intent only"
                );
                Ok(FaultInjectionResult::applied(METHOD_SIMULATED, Vec::new())
                    .with_note(format!("isolation rule not created: {err}")))
            }
        }
    }
}
