//! ---
//! chaos_section: "01-core-functionality"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Shared primitives and utilities for the chaos suite."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_kind() -> ExperimentKind {
    ExperimentKind::PodFailure
}

fn default_namespace() -> String {
    "default".to_owned()
}

fn default_target_base_url() -> String {
    "http://localhost:8080".to_owned()
}

fn default_planned_duration() -> Duration {
    Duration::from_secs(300)
}

fn default_recovery_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_pod_label_filter() -> String {
    "backend".to_owned()
}

fn default_health_endpoint() -> String {
    "/health".to_owned()
}

fn default_dependency_endpoint() -> String {
    "/api/products".to_owned()
}

fn default_api_base_url() -> String {
    "https://kubernetes.default.svc".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_database_deployment() -> String {
    "postgres".to_owned()
}

fn default_dependency_port() -> u16 {
    5432
}

fn default_stress_pod_count() -> u32 {
    3
}

fn default_stress_cpu() -> String {
    "500m".to_owned()
}

fn default_stress_memory() -> String {
    "256Mi".to_owned()
}

fn default_stress_image() -> String {
    "busybox:1.36".to_owned()
}

fn default_sample_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_probe_timeout() -> Duration {
    Duration::from_millis(1500)
}

fn default_baseline_timeout() -> Duration {
    Duration::from_millis(5000)
}

fn default_recovery_poll_interval() -> Duration {
    Duration::from_millis(2000)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    "0.0.0.0:9898"
        .parse()
        .expect("valid default metrics address")
}

/// Experiment variants supported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExperimentKind {
    /// Delete one running pod of the target workload.
    PodFailure,
    /// Block egress from the target pods towards a dependency port.
    NetworkPartition,
    /// Deploy short-lived stress pods competing for cluster resources.
    ResourceExhaustion,
    /// Take the backing database away from the target service.
    DatabaseFailure,
}

impl ExperimentKind {
    /// Stable identifier used in logs, metric labels, and reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentKind::PodFailure => "pod-failure",
            ExperimentKind::NetworkPartition => "network-partition",
            ExperimentKind::ResourceExhaustion => "resource-exhaustion",
            ExperimentKind::DatabaseFailure => "database-failure",
        }
    }

    /// Recovery-time objective used for the `exceededSLA` flag only.
    pub fn recovery_sla(&self) -> Duration {
        match self {
            ExperimentKind::PodFailure => Duration::from_secs(30),
            ExperimentKind::NetworkPartition => Duration::from_secs(30),
            ExperimentKind::ResourceExhaustion => Duration::from_secs(45),
            ExperimentKind::DatabaseFailure => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-run experiment parameters supplied by the invoking harness.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Which fault variant to execute.
    #[serde(default = "default_kind")]
    pub kind: ExperimentKind,
    /// Namespace hosting the target workload.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Base URL of the target service HTTP surface.
    #[serde(default = "default_target_base_url")]
    pub target_base_url: String,
    /// Planned experiment duration; the hold phase uses a bounded portion of it.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_planned_duration")]
    pub planned_duration: Duration,
    /// Upper bound on the post-restore recovery wait.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_recovery_timeout")]
    pub recovery_timeout: Duration,
    /// Substring selecting which pods belong to the target workload.
    #[serde(default = "default_pod_label_filter")]
    pub pod_label_filter: String,
    /// Liveness probe path on the target service.
    #[serde(default = "default_health_endpoint")]
    pub health_endpoint: String,
    /// Endpoint exercising the dependency under test (database and friends).
    #[serde(default = "default_dependency_endpoint")]
    pub dependency_endpoint: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            kind: default_kind(),
            namespace: default_namespace(),
            target_base_url: default_target_base_url(),
            planned_duration: default_planned_duration(),
            recovery_timeout: default_recovery_timeout(),
            pod_label_filter: default_pod_label_filter(),
            health_endpoint: default_health_endpoint(),
            dependency_endpoint: default_dependency_endpoint(),
        }
    }
}

/// Sizing for the resource-exhaustion stress pods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StressConfig {
    /// Number of stress pods created per run.
    #[serde(default = "default_stress_pod_count")]
    pub pod_count: u32,
    /// CPU request/limit per stress pod.
    #[serde(default = "default_stress_cpu")]
    pub cpu: String,
    /// Memory request/limit per stress pod.
    #[serde(default = "default_stress_memory")]
    pub memory: String,
    /// Container image running the stress loop.
    #[serde(default = "default_stress_image")]
    pub image: String,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            pod_count: default_stress_pod_count(),
            cpu: default_stress_cpu(),
            memory: default_stress_memory(),
            image: default_stress_image(),
        }
    }
}

/// Connection details for the cluster control API.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Base URL of the cluster API server.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Optional path to a bearer token file (service account mount).
    #[serde(default)]
    pub token_path: Option<PathBuf>,
    /// Bound applied to every cluster API request.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
    /// Deployment owning the database workload.
    #[serde(default = "default_database_deployment")]
    pub database_deployment: String,
    /// Dependency port blocked by network-isolation rules.
    #[serde(default = "default_dependency_port")]
    pub dependency_port: u16,
    /// Stress pod sizing for resource exhaustion.
    #[serde(default)]
    pub stress: StressConfig,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            token_path: None,
            request_timeout: default_request_timeout(),
            database_deployment: default_database_deployment(),
            dependency_port: default_dependency_port(),
            stress: StressConfig::default(),
        }
    }
}

/// Cadences used by the health monitor and recovery detector.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Interval between health-sample ticks.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_sample_interval")]
    pub sample_interval: Duration,
    /// Per-request timeout during monitoring; must stay below the interval.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: Duration,
    /// Longer timeout used for baseline and recovery validation requests.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_baseline_timeout")]
    pub baseline_timeout: Duration,
    /// Interval between recovery predicate polls.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_recovery_poll_interval")]
    pub recovery_poll_interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_interval: default_sample_interval(),
            probe_timeout: default_probe_timeout(),
            baseline_timeout: default_baseline_timeout(),
            recovery_poll_interval: default_recovery_poll_interval(),
        }
    }
}

/// Logging sink configuration shared by every binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory receiving rolling daily log files.
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    /// Optional file prefix override; defaults to the service name.
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Stdout format.
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            file_prefix: None,
            format: default_log_format(),
        }
    }
}

/// Prometheus exposition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to serve the scrape endpoint during a run.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Listen address for the `/metrics` endpoint.
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

/// Primary configuration object for the faultlab runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Experiment parameters for this run.
    #[serde(default)]
    pub experiment: ExperimentConfig,
    /// Cluster control API connection settings.
    #[serde(default)]
    pub cluster: ClusterConfig,
    /// Sampling and polling cadences.
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Logging sink configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Prometheus exposition settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    /// The parsed configuration.
    pub config: AppConfig,
    /// Path the configuration was read from.
    pub source: PathBuf,
}

impl AppConfig {
    /// Environment variable overriding the candidate path list.
    pub const ENV_CONFIG_PATH: &str = "FAULTLAB_CONFIG";

    /// Load configuration from disk, respecting the `FAULTLAB_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path.to_path_buf())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path.to_path_buf(),
                });
            }
        }

        Err(anyhow!(
            "no configuration file found; set {} or provide --config",
            Self::ENV_CONFIG_PATH
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("unable to parse config file {}", path.display()))?;
        debug!(path = %path.display(), "configuration loaded");
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.experiment.planned_duration.is_zero() {
            return Err(anyhow!("experiment.planned_duration must be non-zero"));
        }
        if self.experiment.recovery_timeout.is_zero() {
            return Err(anyhow!("experiment.recovery_timeout must be non-zero"));
        }
        if self.monitor.probe_timeout >= self.monitor.sample_interval {
            return Err(anyhow!(
                "monitor.probe_timeout ({:?}) must be shorter than monitor.sample_interval ({:?})",
                self.monitor.probe_timeout,
                self.monitor.sample_interval
            ));
        }
        if self.cluster.stress.pod_count == 0 {
            return Err(anyhow!("cluster.stress.pod_count must be at least 1"));
        }
        Ok(())
    }
}
