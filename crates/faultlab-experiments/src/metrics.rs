//! ---
//! chaos_section: "04-experiments"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Fault strategies and the experiment lifecycle controller."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info};

use faultlab_common::config::ExperimentKind;
use faultlab_probe::HealthSample;

/// Shared registry type used across the workspace.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Metrics published by the experiment subsystem.
#[derive(Clone)]
pub struct ExperimentMetrics {
    registry: SharedRegistry,
    experiments_total: IntCounterVec,
    injection_methods_total: IntCounterVec,
    recovery_seconds: HistogramVec,
    health_samples_total: IntCounterVec,
}

impl ExperimentMetrics {
    /// Register the experiment metric family against the provided registry.
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let experiments_total = IntCounterVec::new(
            Opts::new(
                "faultlab_experiments_total",
                "Completed experiment runs by variant and outcome",
            ),
            &["experiment", "outcome"],
        )?;
        registry.register(Box::new(experiments_total.clone()))?;

        let injection_methods_total = IntCounterVec::new(
            Opts::new(
                "faultlab_injection_methods_total",
                "Fault-injection method selections, including all-failed",
            ),
            &["experiment", "method"],
        )?;
        registry.register(Box::new(injection_methods_total.clone()))?;

        let histogram_opts = HistogramOpts::new(
            "faultlab_recovery_seconds",
            "Observed time between fault removal and the first healthy response",
        )
        .buckets(prometheus::exponential_buckets(0.5, 2.0, 10)?);
        let recovery_seconds = HistogramVec::new(histogram_opts, &["experiment"])?;
        registry.register(Box::new(recovery_seconds.clone()))?;

        let health_samples_total = IntCounterVec::new(
            Opts::new(
                "faultlab_health_samples_total",
                "Health samples recorded during monitoring, by endpoint and outcome",
            ),
            &["endpoint", "outcome"],
        )?;
        registry.register(Box::new(health_samples_total.clone()))?;

        Ok(Self {
            registry,
            experiments_total,
            injection_methods_total,
            recovery_seconds,
            health_samples_total,
        })
    }

    /// Expose the underlying shared registry for convenience.
    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Count a finished run.
    pub fn observe_run(&self, kind: ExperimentKind, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.experiments_total
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }

    /// Record which injection method ended up being used.
    pub fn observe_injection_method(&self, kind: ExperimentKind, method: &str) {
        self.injection_methods_total
            .with_label_values(&[kind.as_str(), method])
            .inc();
    }

    /// Record how long recovery took (only when recovery was observed).
    pub fn observe_recovery(&self, kind: ExperimentKind, elapsed: Duration) {
        self.recovery_seconds
            .with_label_values(&[kind.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Bump per-endpoint sample counters for a drained session.
    pub fn observe_samples(&self, samples: &[HealthSample]) {
        for sample in samples {
            let outcome = if sample.succeeded { "success" } else { "failure" };
            self.health_samples_total
                .with_label_values(&[sample.endpoint.as_str(), outcome])
                .inc();
        }
    }
}

impl std::fmt::Debug for ExperimentMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExperimentMetrics").finish_non_exhaustive()
    }
}

/// Spawn an HTTP server that exposes the registry at `/metrics`.
pub fn spawn_http_server(registry: SharedRegistry, addr: SocketAddr) -> Result<MetricsServer> {
    let app = Router::new().route(
        "/metrics",
        get({
            let registry = registry.clone();
            move || metrics_handler(registry.clone())
        }),
    );

    let std_listener = StdTcpListener::bind(addr)
        .with_context(|| format!("failed to bind metrics listener {}", addr))?;
    std_listener
        .set_nonblocking(true)
        .context("failed to configure metrics listener as non-blocking")?;
    let listener = TcpListener::from_std(std_listener)
        .context("failed to convert std listener into tokio listener")?;

    info!(address = %addr, "metrics server starting");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let service = app.into_make_service();
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        axum::serve(listener, service)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
            .context("metrics server encountered an error")?;
        Ok(())
    });

    Ok(MetricsServer {
        addr,
        shutdown: Some(shutdown_tx),
        task: handle,
    })
}

async fn metrics_handler(registry: SharedRegistry) -> impl IntoResponse {
    let families = registry.gather();
    let encoder = TextEncoder::new();
    match encoder.encode_to_string(&families) {
        Ok(body) => (
            StatusCode::OK,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_str(encoder.format_type())
                    .expect("prometheus format type is a valid header value"),
            )],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                String::from("metrics encoding error"),
            )
                .into_response()
        }
    }
}

/// Handle to the running HTTP exporter.
#[derive(Debug)]
pub struct MetricsServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl MetricsServer {
    /// Return the bound address for convenience.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and await task completion.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.task.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err),
            Err(join_err) => Err(anyhow::Error::new(join_err)),
        }
    }
}
