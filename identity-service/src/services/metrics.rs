//! Prometheus export for the `metrics` facade.
//!
//! Counters and histograms are recorded with the `metrics` macros where the
//! work happens; this module owns the recorder and renders `/metrics`.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup, before any metric
/// is recorded; a second call is a no-op.
pub fn init_metrics() -> Result<(), BuildError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    if METRICS_HANDLE.set(handle).is_err() {
        tracing::warn!("Metrics recorder already initialized");
    }

    describe_counter!(
        "identity_resolutions_total",
        "Identify requests resolved, by outcome"
    );
    describe_counter!(
        "identity_conflict_retries_total",
        "Resolutions re-run after a conflicting concurrent write"
    );
    describe_histogram!(
        "identity_db_query_duration_seconds",
        Unit::Seconds,
        "Contact store query latency"
    );
    Ok(())
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}
