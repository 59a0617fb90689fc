//! ---
//! chaos_section: "01-core-functionality"
//! chaos_subsection: "module"
//! chaos_type: "source"
//! chaos_scope: "code"
//! chaos_description: "Shared primitives and utilities for the chaos suite."
//! chaos_version: "v0.0.0-prealpha"
//! chaos_owner: "tbd"
//! ---
use std::time::{Duration, Instant};

/// Capture an instant suitable for elapsed-time measurement.
pub fn monotonic_now() -> Instant {
    Instant::now()
}

/// Convert a duration into whole milliseconds, saturating at `u64::MAX`.
pub fn duration_to_millis(duration: Duration) -> u64 {
    duration
        .as_secs()
        .saturating_mul(1_000)
        .saturating_add(u64::from(duration.subsec_millis()))
}
