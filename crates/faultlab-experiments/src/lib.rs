//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Fault-injection experiments against a live Kubernetes-hosted service.
//!
//! Four experiment variants (pod failure, network partition, resource
//! exhaustion, database failure) share one six-phase lifecycle driven by
//! [`ExperimentRunner`]: validate baseline, start the health monitor, inject
//! the fault through the variant's ordered fallback methods, hold, restore,
//! wait for recovery, and assemble an [`ExperimentReport`]. The runner never
//! returns an error; every internal failure becomes a well-formed report
//! with `success = false`.

pub mod controller;
pub mod database_failure;
pub mod metrics;
pub mod network_partition;
pub mod pod_failure;
pub mod report;
pub mod resource_exhaustion;
pub mod strategy;

#[cfg(test)]
pub(crate) mod testutil;

pub use controller::ExperimentRunner;
pub use metrics::{new_registry, spawn_http_server, ExperimentMetrics, MetricsServer, SharedRegistry};
pub use report::{ExperimentReport, ReportMetrics};
pub use strategy::{
    strategy_for, AppliedArtifact, FaultInjectionResult, FaultStrategy, StrategyContext,
    METHOD_ALL_FAILED,
};
