//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
//! Observation side of the chaos suite: the probe issuing bounded-timeout
//! requests against the target service, the background health monitor that
//! samples it for the lifetime of an experiment, the bounded-wait recovery
//! detector, and the pure statistics used in the final report.

pub mod monitor;
pub mod recovery;
pub mod sample;
pub mod stats;
pub mod target;

pub use monitor::{HealthMonitor, HealthMonitorSession};
pub use recovery::{RecoveryDetector, RecoveryOutcome};
pub use sample::HealthSample;
pub use stats::{summarize, HealthStatistics, RECENT_SAMPLE_LIMIT};
pub use target::{HttpTargetProbe, TargetProber};
