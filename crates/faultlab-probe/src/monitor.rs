//! ---
//! chaos_section: "03-observation"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Target probing, health monitoring, and recovery detection."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::sample::HealthSample;
use crate::target::TargetProber;

/// Starts and stops background sampling sessions.
#[derive(Debug)]
pub struct HealthMonitor;

impl HealthMonitor {
    /// Attach a recurring sampler to the target. Each tick probes every
    /// configured endpoint once and pushes the resulting samples onto a
    /// channel owned by the returned session. Sampling continues, whatever
    /// the experiment is doing, until [`HealthMonitorSession::stop`] is
    /// called.
    pub fn start(
        prober: Arc<dyn TargetProber>,
        endpoints: Vec<String>,
        sample_interval: Duration,
        probe_timeout: Duration,
    ) -> HealthMonitorSession {
        let (sample_tx, sample_rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(sample_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        // Sender dropped counts as stop too.
                        let _ = changed;
                        break;
                    }
                    _ = ticker.tick() => {
                        ticks += 1;
                        for endpoint in &endpoints {
                            let sample = prober.probe(endpoint, probe_timeout).await;
                            // A stop may have arrived while the probe was in
                            // flight; a finalized session must not grow.
                            if *stop_rx.borrow() {
                                trace!(target: "faultlab::monitor", endpoint = %endpoint, "discarding in-flight sample after stop");
                                return;
                            }
                            trace!(
                                target: "faultlab::monitor",
                                endpoint = %endpoint,
                                succeeded = sample.succeeded,
                                latency_ms = sample.latency_ms,
                                "health sample recorded"
                            );
                            if sample_tx.send(sample).is_err() {
                                return;
                            }
                        }
                    }
                }
            }
            debug!(target: "faultlab::monitor", ticks, "health monitor stopped");
        });

        HealthMonitorSession {
            started_at: Utc::now(),
            stop_tx,
            sample_rx,
            task,
        }
    }
}

/// Mutable state of a running monitor. Owned exclusively by whoever started
/// it; consumed by [`HealthMonitorSession::stop`], which yields the final,
/// strictly tick-ordered sample sequence.
#[derive(Debug)]
pub struct HealthMonitorSession {
    /// When sampling began.
    pub started_at: DateTime<Utc>,
    stop_tx: watch::Sender<bool>,
    sample_rx: mpsc::UnboundedReceiver<HealthSample>,
    task: JoinHandle<()>,
}

impl HealthMonitorSession {
    /// Cancel the recurring sampler and drain every sample recorded before
    /// the stop signal. In-flight probes at stop time are discarded by the
    /// sampler itself.
    pub async fn stop(mut self) -> Vec<HealthSample> {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
        let mut samples = Vec::new();
        while let Ok(sample) = self.sample_rx.try_recv() {
            samples.push(sample);
        }
        debug!(target: "faultlab::monitor", samples = samples.len(), "health monitor drained");
        samples
    }
}
