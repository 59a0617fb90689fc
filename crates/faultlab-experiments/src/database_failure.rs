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
use futures::future::join_all;
use tracing::{info, warn};

use faultlab_cluster::NetworkRuleSpec;
use faultlab_common::config::ExperimentKind;

use crate::strategy::{
    run_suffix, AppliedArtifact, FaultInjectionResult, FaultStrategy, StrategyContext,
};

/// Identifier for scaling the database deployment to zero replicas.
pub const METHOD_SCALE_TO_ZERO: &str = "scale-to-zero";
/// Identifier for blocking the database port with an isolation rule.
pub const METHOD_NETWORK_RULE: &str = "network-policy";
/// Identifier for saturating the target's request handling.
pub const METHOD_CONNECTION_OVERLOAD: &str = "connection-overload";

/// Concurrent slow requests fired by the connection-overload fallback.
const OVERLOAD_BURST: usize = 20;
/// Per-request timeout during the overload burst; generous on purpose so
/// the requests hold connections open rather than fail fast.
const OVERLOAD_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Takes the database away from the target service, trying in order:
/// scale the owning deployment to zero, block the database port with a
/// network-isolation rule, or saturate the target's request handling with a
/// burst of slow concurrent requests. The first method whose API call
/// succeeds is recorded; later methods are not attempted.
#[derive(Debug, Default)]
pub struct DatabaseFailureStrategy;

impl DatabaseFailureStrategy {
    async fn try_scale_to_zero(&self, ctx: &StrategyContext) -> Option<FaultInjectionResult> {
        let namespace = &ctx.experiment.namespace;
        let deployment = &ctx.cluster_cfg.database_deployment;
        let original = match ctx.cluster.deployment_replicas(namespace, deployment).await {
            Ok(replicas) => replicas,
            Err(err) => {
                warn!(target: "faultlab::inject", deployment = %deployment, error = %err, "scale-to-zero unavailable");
                return None;
            }
        };
        if let Err(err) = ctx.cluster.scale_deployment(namespace, deployment, 0).await {
            warn!(target: "faultlab::inject", deployment = %deployment, error = %err, "scale-to-zero patch failed");
            return None;
        }
        info!(
            target: "faultlab::inject",
            deployment = %deployment,
            original_replicas = original,
            "database deployment scaled to zero"
        );
        Some(FaultInjectionResult::applied(
            METHOD_SCALE_TO_ZERO,
            vec![AppliedArtifact::ReplicaCount {
                deployment: deployment.clone(),
                original_replicas: original,
            }],
        ))
    }

    async fn try_network_rule(&self, ctx: &StrategyContext) -> Option<FaultInjectionResult> {
        let namespace = &ctx.experiment.namespace;
        let spec = NetworkRuleSpec {
            name: format!("faultlab-db-block-{}", run_suffix()),
            app_selector: ctx.experiment.pod_label_filter.clone(),
            blocked_port: ctx.cluster_cfg.dependency_port,
        };
        match ctx.cluster.create_network_rule(namespace, &spec).await {
            Ok(name) => {
                info!(target: "faultlab::inject", rule = %name, blocked_port = spec.blocked_port, "database port blocked");
                Some(FaultInjectionResult::applied(
                    METHOD_NETWORK_RULE,
                    vec![AppliedArtifact::NetworkRule { name }],
                ))
            }
            Err(err) => {
                warn!(target: "faultlab::inject", error = %err, "database network rule unavailable");
                None
            }
        }
    }

    /// Last resort: always reachable, since it only needs the target's own
    /// HTTP surface. Fires a burst of concurrent slow requests against the
    /// dependency-exercising endpoint to tie up its connection handling.
    async fn connection_overload(&self, ctx: &StrategyContext) -> FaultInjectionResult {
        let endpoint = ctx.experiment.dependency_endpoint.clone();
        let probes = (0..OVERLOAD_BURST)
            .map(|_| ctx.prober.probe(&endpoint, OVERLOAD_REQUEST_TIMEOUT));
        let outcomes = join_all(probes).await;
        let completed = outcomes.iter().filter(|sample| sample.succeeded).count();
        info!(
            target: "faultlab::inject",
            burst = OVERLOAD_BURST,
            completed,
            endpoint = %endpoint,
            "connection overload burst fired"
        );
        FaultInjectionResult::applied(
            METHOD_CONNECTION_OVERLOAD,
            vec![AppliedArtifact::ConnectionSaturation],
        )
    }
}

#[async_trait]
impl FaultStrategy for DatabaseFailureStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::DatabaseFailure
    }

    async fn inject(&self, ctx: &StrategyContext) -> Result<FaultInjectionResult> {
        if let Some(result) = self.try_scale_to_zero(ctx).await {
            return Ok(result);
        }
        if let Some(result) = self.try_network_rule(ctx).await {
            return Ok(result);
        }
        Ok(self.connection_overload(ctx).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{test_context, FakeCluster, ScriptedProber};
    use std::sync::Arc;

    #[tokio::test]
    async fn prefers_scale_to_zero_and_captures_original_replicas() {
        let cluster = Arc::new(FakeCluster::default().with_replicas("postgres", 2));
        let ctx = test_context(cluster.clone(), Arc::new(ScriptedProber::always_healthy()));
        let result = DatabaseFailureStrategy.inject(&ctx).await.unwrap();
        assert_eq!(result.method_used, METHOD_SCALE_TO_ZERO);
        assert_eq!(
            result.applied_artifacts,
            vec![AppliedArtifact::ReplicaCount {
                deployment: "postgres".into(),
                original_replicas: 2,
            }]
        );
        assert_eq!(cluster.scaled.lock().as_slice(), [("postgres".into(), 0)]);
        // Later methods were never attempted.
        assert!(cluster.created_rules.lock().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_network_rule_when_scaling_denied() {
        let cluster = Arc::new(FakeCluster::default().deny_scale());
        let ctx = test_context(cluster.clone(), Arc::new(ScriptedProber::always_healthy()));
        let result = DatabaseFailureStrategy.inject(&ctx).await.unwrap();
        assert_eq!(result.method_used, METHOD_NETWORK_RULE);
        assert_eq!(cluster.created_rules.lock().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_cluster_methods_end_in_connection_overload() {
        let cluster = Arc::new(FakeCluster::default().deny_scale().deny_network_rules());
        let prober = Arc::new(ScriptedProber::always_healthy());
        let ctx = test_context(cluster.clone(), prober.clone());
        let result = DatabaseFailureStrategy.inject(&ctx).await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.method_used, METHOD_CONNECTION_OVERLOAD);
        assert_eq!(prober.calls() as usize, OVERLOAD_BURST);
    }

    #[tokio::test]
    async fn restore_scales_the_deployment_back() {
        let cluster = Arc::new(FakeCluster::default().with_replicas("postgres", 3));
        let ctx = test_context(cluster.clone(), Arc::new(ScriptedProber::always_healthy()));
        let result = DatabaseFailureStrategy.inject(&ctx).await.unwrap();
        DatabaseFailureStrategy.restore(&ctx, &result).await;
        assert_eq!(*cluster.replicas.lock().get("postgres").unwrap(), 3);
    }
}
