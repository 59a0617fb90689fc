//! ---
//! chaos_section: "02-cluster-interfaces"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Cluster control API contract and HTTP client."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
//! Contract and production client for the cluster control API consumed by
//! the fault-injection strategies. The orchestrator never talks to the
//! cluster directly; everything goes through [`ClusterControl`] so tests can
//! substitute scripted fakes and so permission failures degrade into
//! fallback selection instead of aborting a run.

pub mod api;
pub mod error;
pub mod http;

pub use api::{ClusterControl, NetworkRuleSpec, PodSummary, StressPodSpec};
pub use error::ClusterError;
pub use http::HttpClusterClient;
