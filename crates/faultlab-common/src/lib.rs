//! ---
//! chaos_section: "01-core-functionality"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Shared primitives and utilities for the chaos suite."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
//! Core shared primitives for the faultlab workspace.
//! This crate exposes configuration loading, logging initialisation, and
//! timing utilities consumed across the workspace.

pub mod config;
pub mod logging;
pub mod time;

pub use config::{
    AppConfig, ClusterConfig, ExperimentConfig, ExperimentKind, LoggingConfig, MetricsConfig,
    MonitorConfig, StressConfig,
};
pub use logging::{init_tracing, LogFormat};
