//! ---
//! chaos_section: "01-core-functionality"
//! chaos_subsection: "binary"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Binary entrypoint for the faultlab runner."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use faultlab_cluster::HttpClusterClient;
use faultlab_common::config::{AppConfig, ExperimentKind};
use faultlab_common::logging::init_tracing;
use faultlab_experiments::{new_registry, spawn_http_server, ExperimentMetrics, ExperimentRunner};
use faultlab_probe::HttpTargetProbe;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    version = concat!("faultlab ", env!("CARGO_PKG_VERSION")),
    about = "faultlab chaos experiment runner",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, help = "Override the configured experiment variant")]
    experiment: Option<CliExperiment>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliExperiment {
    PodFailure,
    NetworkPartition,
    ResourceExhaustion,
    DatabaseFailure,
}

impl From<CliExperiment> for ExperimentKind {
    fn from(value: CliExperiment) -> Self {
        match value {
            CliExperiment::PodFailure => ExperimentKind::PodFailure,
            CliExperiment::NetworkPartition => ExperimentKind::NetworkPartition,
            CliExperiment::ResourceExhaustion => ExperimentKind::ResourceExhaustion,
            CliExperiment::DatabaseFailure => ExperimentKind::DatabaseFailure,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the configured experiment")]
    Run,
    #[command(about = "Load and validate the configuration, then exit")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("faultlab {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/faultlab.toml"));
    candidates.push(PathBuf::from("configs/example.dev.toml"));

    let loaded = AppConfig::load_with_source(&candidates)?;
    let mut config = loaded.config;
    if let Some(kind) = cli.experiment {
        config.experiment.kind = kind.into();
    }

    if matches!(cli.command, Some(Commands::Validate)) {
        println!("configuration OK ({})", loaded.source.display());
        return Ok(());
    }

    init_tracing("faultlabd", &config.logging)?;
    info!(
        config = %loaded.source.display(),
        experiment = %config.experiment.kind,
        namespace = %config.experiment.namespace,
        "faultlabd starting"
    );

    let registry = new_registry();
    let metrics = ExperimentMetrics::new(registry.clone())?;
    let metrics_server = if config.metrics.enabled {
        match spawn_http_server(registry.clone(), config.metrics.listen) {
            Ok(server) => Some(server),
            Err(err) => {
                warn!(error = %err, "metrics endpoint unavailable; continuing without it");
                None
            }
        }
    } else {
        None
    };

    let cluster = Arc::new(HttpClusterClient::new(&config.cluster)?);
    let prober = Arc::new(HttpTargetProbe::new(
        config.experiment.target_base_url.clone(),
    )?);
    let runner = ExperimentRunner::new(cluster, prober, config).with_metrics(metrics);

    let report = runner.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(server) = metrics_server {
        if let Err(err) = server.shutdown().await {
            warn!(error = %err, "metrics server shutdown failed");
        }
    }

    if report.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
