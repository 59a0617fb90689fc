//! ---
//! chaos_section: "02-cluster-interfaces"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Cluster control API contract and HTTP client."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClusterError;

/// Summary of one pod as seen through the control API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PodSummary {
    /// Pod name.
    pub name: String,
    /// Lifecycle phase reported by the cluster (`Running`, `Pending`, ...).
    pub phase: String,
}

impl PodSummary {
    /// Whether the pod is currently in the `Running` phase.
    pub fn is_running(&self) -> bool {
        self.phase.eq_ignore_ascii_case("Running")
    }
}

/// Parameters for a network-isolation rule blocking egress to one port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkRuleSpec {
    /// Name given to the created rule; also its restoration handle.
    pub name: String,
    /// `app` label value selecting the pods the rule applies to.
    pub app_selector: String,
    /// TCP port whose egress traffic the rule blocks.
    pub blocked_port: u16,
}

/// Parameters for one short-lived resource-consuming pod.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StressPodSpec {
    /// Pod name; also its restoration handle.
    pub name: String,
    /// Container image running the stress loop.
    pub image: String,
    /// CPU request and limit (e.g. `500m`).
    pub cpu: String,
    /// Memory request and limit (e.g. `256Mi`).
    pub memory: String,
    /// Deadline after which the cluster reaps the pod on its own.
    pub active_deadline: Duration,
}

/// The cluster control operations the fault strategies depend on.
///
/// Production code talks to the Kubernetes API server via
/// [`crate::HttpClusterClient`]; tests substitute scripted implementations.
/// Every operation may legitimately be unavailable on a given cluster;
/// callers inspect [`ClusterError::is_unavailable`] to decide whether to try
/// the next fallback method.
#[async_trait]
pub trait ClusterControl: Send + Sync {
    /// List pods in a namespace.
    async fn list_pods(&self, namespace: &str) -> Result<Vec<PodSummary>, ClusterError>;

    /// Delete a named pod with zero grace period.
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// Read a deployment's current replica count.
    async fn deployment_replicas(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<i32, ClusterError>;

    /// Patch a deployment's replica count.
    async fn scale_deployment(
        &self,
        namespace: &str,
        name: &str,
        replicas: i32,
    ) -> Result<(), ClusterError>;

    /// Create a network-isolation rule; returns the rule's name.
    async fn create_network_rule(
        &self,
        namespace: &str,
        spec: &NetworkRuleSpec,
    ) -> Result<String, ClusterError>;

    /// Delete a previously created network-isolation rule.
    async fn delete_network_rule(&self, namespace: &str, name: &str)
        -> Result<(), ClusterError>;

    /// Create one stress pod; returns the pod's name.
    async fn create_stress_pod(
        &self,
        namespace: &str,
        spec: &StressPodSpec,
    ) -> Result<String, ClusterError>;
}
