//! ---
//! chaos_section: "05-testing-qa-runbook"
//! chaos_subsection: "test"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "End-to-end experiment scenarios over scripted collaborators."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
//! Full lifecycle runs against scripted cluster and target implementations,
//! with millisecond-scale cadences standing in for the production ones.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use faultlab_cluster::{
    ClusterControl, ClusterError, NetworkRuleSpec, PodSummary, StressPodSpec,
};
use faultlab_common::config::{AppConfig, ExperimentKind};
use faultlab_probe::{HealthSample, TargetProber};
use faultlab_experiments::ExperimentRunner;

#[derive(Default)]
struct ScenarioCluster {
    pods: Mutex<Vec<PodSummary>>,
    replicas: Mutex<HashMap<String, i32>>,
    deny_scale: bool,
    deny_network_rules: bool,
    fail_rule_deletion: bool,
    deleted_pods: Mutex<Vec<String>>,
    created_rules: Mutex<Vec<String>>,
    deleted_rules: Mutex<Vec<String>>,
}

fn denied(operation: &str) -> ClusterError {
    ClusterError::Unavailable {
        operation: operation.to_owned(),
        reason: "HTTP 403: forbidden".to_owned(),
    }
}

#[async_trait]
impl ClusterControl for ScenarioCluster {
    async fn list_pods(&self, _namespace: &str) -> Result<Vec<PodSummary>, ClusterError> {
        Ok(self.pods.lock().clone())
    }

    async fn delete_pod(&self, _namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.deleted_pods.lock().push(name.to_owned());
        Ok(())
    }

    async fn deployment_replicas(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError> {
        if self.deny_scale {
            return Err(denied("read deployment scale"));
        }
        self.replicas
            .lock()
            .get(name)
            .copied()
            .ok_or(ClusterError::NotFound {
                operation: "read deployment scale".to_owned(),
            })
    }

    async fn scale_deployment(
        &self,
        _namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError> {
        if self.deny_scale {
            return Err(denied("patch deployment scale"));
        }
        self.replicas.lock().insert(name.to_owned(), replicas);
        Ok(())
    }

    async fn create_network_rule(
        &self,
        _namespace: &str,
        spec: &NetworkRuleSpec,
    ) -> Result<String, ClusterError> {
        if self.deny_network_rules {
            return Err(denied("create network rule"));
        }
        self.created_rules.lock().push(spec.name.clone());
        Ok(spec.name.clone())
    }

    async fn delete_network_rule(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        if self.fail_rule_deletion {
            return Err(ClusterError::Request {
                operation: "delete network rule".to_owned(),
                reason: "HTTP 500: etcd leader changed".to_owned(),
            });
        }
        self.deleted_rules.lock().push(name.to_owned());
        Ok(())
    }

    async fn create_stress_pod(
        &self,
        _namespace: &str,
        spec: &StressPodSpec,
    ) -> Result<String, ClusterError> {
        Ok(spec.name.clone())
    }
}

/// Healthy target that goes dark during a fixed window after start, the way
/// a deleted pod looks until its replacement comes up.
struct OutageWindowProber {
    started: Instant,
    outage_from: Duration,
    outage_until: Duration,
}

#[async_trait]
impl TargetProber for OutageWindowProber {
    async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
        let elapsed = self.started.elapsed();
        if elapsed >= self.outage_from && elapsed < self.outage_until {
            HealthSample::failure(endpoint, 3, None, "connection refused")
        } else {
            HealthSample::success(endpoint, 3, 200)
        }
    }
}

/// Healthy everywhere except one endpoint that never comes back.
struct DeadDependencyProber {
    dead_endpoint: String,
}

#[async_trait]
impl TargetProber for DeadDependencyProber {
    async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
        if endpoint == self.dead_endpoint {
            HealthSample::failure(endpoint, 3, Some(500), "unhealthy status 500")
        } else {
            HealthSample::success(endpoint, 3, 200)
        }
    }
}

struct AlwaysHealthy;

#[async_trait]
impl TargetProber for AlwaysHealthy {
    async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
        HealthSample::success(endpoint, 3, 200)
    }
}

fn fast_config(kind: ExperimentKind) -> AppConfig {
    let mut config = AppConfig::default();
    config.experiment.kind = kind;
    config.experiment.namespace = "shop".to_owned();
    config.experiment.planned_duration = Duration::from_millis(200);
    config.experiment.recovery_timeout = Duration::from_millis(300);
    config.monitor.sample_interval = Duration::from_millis(15);
    config.monitor.probe_timeout = Duration::from_millis(10);
    config.monitor.baseline_timeout = Duration::from_millis(10);
    config.monitor.recovery_poll_interval = Duration::from_millis(20);
    config
}

#[tokio::test]
async fn pod_failure_end_to_end_with_gap_and_recovery() {
    let cluster = Arc::new(ScenarioCluster::default());
    cluster.pods.lock().push(PodSummary {
        name: "backend-6b7f".to_owned(),
        phase: "Running".to_owned(),
    });
    let prober = Arc::new(OutageWindowProber {
        started: Instant::now(),
        outage_from: Duration::from_millis(40),
        outage_until: Duration::from_millis(120),
    });
    let runner = ExperimentRunner::new(
        cluster.clone(),
        prober,
        fast_config(ExperimentKind::PodFailure),
    );

    let report = runner.run().await;

    assert!(report.success);
    assert_eq!(cluster.deleted_pods.lock().as_slice(), ["backend-6b7f"]);

    // The sample series shows an outage gap followed by resumed successes.
    let samples = &report.metrics.health.recent_samples;
    let first_failure = samples.iter().position(|s| !s.succeeded);
    let last_success = samples.iter().rposition(|s| s.succeeded);
    assert!(
        matches!((first_failure, last_success), (Some(f), Some(s)) if f < s),
        "expected a gap followed by resumed 200s in {samples:?}"
    );

    let recovery = report.metrics.recovery.as_ref().unwrap();
    assert!(recovery.recovered);
    assert!(!recovery.exceeded_sla);
}

#[tokio::test]
async fn database_failure_falls_through_to_connection_overload() {
    let mut cluster = ScenarioCluster::default();
    cluster.deny_scale = true;
    cluster.deny_network_rules = true;
    let runner = ExperimentRunner::new(
        Arc::new(cluster),
        Arc::new(AlwaysHealthy),
        fast_config(ExperimentKind::DatabaseFailure),
    );

    let report = runner.run().await;
    let value = serde_json::to_value(&report).unwrap();

    // The serialized contract the CI consumers depend on.
    assert_eq!(value["success"], true);
    assert_eq!(value["experimentType"], "database-failure");
    assert_eq!(value["metrics"]["injection"]["methodUsed"], "connection-overload");
    assert_eq!(value["metrics"]["injection"]["succeeded"], true);
    assert!(value["durationMs"].as_u64().unwrap() > 0);
    assert!(value["timestamp"].is_string());
}

#[tokio::test]
async fn failed_restoration_surfaces_as_recovery_timeout_not_run_failure() {
    let mut cluster = ScenarioCluster::default();
    cluster.fail_rule_deletion = true;
    let cluster = Arc::new(cluster);
    // The partition rule is created but can never be removed, and the
    // dependency endpoint stays dark for the whole run.
    let prober = Arc::new(DeadDependencyProber {
        dead_endpoint: "/api/products".to_owned(),
    });
    let runner = ExperimentRunner::new(
        cluster.clone(),
        prober,
        fast_config(ExperimentKind::NetworkPartition),
    );

    let report = runner.run().await;

    assert!(report.success, "the run completed; only recovery failed");
    assert_eq!(cluster.created_rules.lock().len(), 1);
    assert!(cluster.deleted_rules.lock().is_empty());
    let recovery = report.metrics.recovery.as_ref().unwrap();
    assert!(!recovery.recovered);
    assert!(recovery.exceeded_sla);
    assert_eq!(recovery.elapsed_ms, 300);
}

#[tokio::test]
async fn scale_to_zero_is_reversed_during_restoration() {
    let cluster = Arc::new(ScenarioCluster::default());
    cluster.replicas.lock().insert("postgres".to_owned(), 2);
    let runner = ExperimentRunner::new(
        cluster.clone(),
        Arc::new(AlwaysHealthy),
        fast_config(ExperimentKind::DatabaseFailure),
    );

    let report = runner.run().await;

    assert!(report.success);
    assert_eq!(
        report.metrics.injection.as_ref().unwrap().method_used,
        "scale-to-zero"
    );
    assert_eq!(*cluster.replicas.lock().get("postgres").unwrap(), 2);
}
