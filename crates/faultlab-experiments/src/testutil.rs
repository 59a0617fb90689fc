//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
//! Scripted collaborators shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use faultlab_cluster::{
    ClusterControl, ClusterError, NetworkRuleSpec, PodSummary, StressPodSpec,
};
use faultlab_common::config::{ClusterConfig, ExperimentConfig};
use faultlab_probe::{HealthSample, TargetProber};

use crate::strategy::StrategyContext;

fn denied(operation: &str) -> ClusterError {
    ClusterError::Unavailable {
        operation: operation.to_owned(),
        reason: "HTTP 403: forbidden".to_owned(),
    }
}

/// Scripted cluster with per-operation availability switches and recorded
/// mutations.
#[derive(Default)]
pub struct FakeCluster {
    pub pods: Mutex<Vec<PodSummary>>,
    pub replicas: Mutex<HashMap<String, i32>>,
    pub deny_scale: bool,
    pub deny_network_rules: bool,
    pub deny_stress: bool,
    pub deleted_pods: Mutex<Vec<String>>,
    pub scaled: Mutex<Vec<(String, i32)>>,
    pub created_rules: Mutex<Vec<NetworkRuleSpec>>,
    pub deleted_rules: Mutex<Vec<String>>,
    pub created_stress: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn with_pods(self, pods: Vec<PodSummary>) -> Self {
        *self.pods.lock() = pods;
        self
    }

    pub fn with_replicas(self, deployment: &str, count: i32) -> Self {
        self.replicas.lock().insert(deployment.to_owned(), count);
        self
    }

    pub fn deny_scale(mut self) -> Self {
        self.deny_scale = true;
        self
    }

    pub fn deny_network_rules(mut self) -> Self {
        self.deny_network_rules = true;
        self
    }

    pub fn deny_stress(mut self) -> Self {
        self.deny_stress = true;
        self
    }
}

#[async_trait]
impl ClusterControl for FakeCluster {
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
        self.scaled.lock().push((name.to_owned(), replicas));
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
        self.created_rules.lock().push(spec.clone());
        Ok(spec.name.clone())
    }

    async fn delete_network_rule(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<(), ClusterError> {
        self.deleted_rules.lock().push(name.to_owned());
        Ok(())
    }

    async fn create_stress_pod(
        &self,
        _namespace: &str,
        spec: &StressPodSpec,
    ) -> Result<String, ClusterError> {
        if self.deny_stress {
            return Err(denied("create stress pod"));
        }
        self.created_stress.lock().push(spec.name.clone());
        Ok(spec.name.clone())
    }
}

/// Prober that fails its first `unhealthy_calls` probes and succeeds after.
pub struct ScriptedProber {
    unhealthy_calls: u32,
    calls: AtomicU32,
}

impl ScriptedProber {
    pub fn always_healthy() -> Self {
        Self {
            unhealthy_calls: 0,
            calls: AtomicU32::new(0),
        }
    }

    pub fn unhealthy_for(calls: u32) -> Self {
        Self {
            unhealthy_calls: calls,
            calls: AtomicU32::new(0),
        }
    }

    pub fn never_healthy() -> Self {
        Self::unhealthy_for(u32::MAX)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetProber for ScriptedProber {
    async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.unhealthy_calls {
            HealthSample::failure(endpoint, 2, Some(503), "unhealthy status 503")
        } else {
            HealthSample::success(endpoint, 2, 200)
        }
    }
}

/// Prober that is healthy everywhere except one permanently broken endpoint.
pub struct BrokenEndpointProber {
    pub broken_endpoint: String,
}

#[async_trait]
impl TargetProber for BrokenEndpointProber {
    async fn probe(&self, endpoint: &str, _timeout: Duration) -> HealthSample {
        if endpoint == self.broken_endpoint {
            HealthSample::failure(endpoint, 2, Some(500), "unhealthy status 500")
        } else {
            HealthSample::success(endpoint, 2, 200)
        }
    }
}

/// Context over scripted collaborators with short, test-friendly durations.
pub fn test_context(cluster: Arc<FakeCluster>, prober: Arc<ScriptedProber>) -> StrategyContext {
    let mut experiment = ExperimentConfig::default();
    experiment.planned_duration = Duration::from_secs(1);
    experiment.recovery_timeout = Duration::from_secs(1);
    StrategyContext {
        cluster,
        prober,
        experiment,
        cluster_cfg: ClusterConfig::default(),
    }
}
