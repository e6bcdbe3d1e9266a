use std::net::SocketAddr;

// ── Batch runs ──────────────────────────────────────────────────

/// Counter: batch runs finished. Labels: batch, status.
pub const BATCH_RUNS_TOTAL: &str = "framegen_batch_runs_total";

/// Histogram: batch wall time in seconds. Labels: batch.
pub const BATCH_DURATION_SECONDS: &str = "framegen_batch_duration_seconds";

// ── Frames ──────────────────────────────────────────────────────

/// Counter: spaces seen by the planner. Labels: plan (bootstrap, extend, covered, skipped).
pub const SPACES_TOTAL: &str = "framegen_spaces_total";

/// Counter: frame rows produced by the planner.
pub const FRAMES_PLANNED_TOTAL: &str = "framegen_frames_planned_total";

/// Counter: frame rows written to the store.
pub const FRAMES_INSERTED_TOTAL: &str = "framegen_frames_inserted_total";

/// Counter: incomplete frames deleted by a retry run.
pub const FRAMES_ROLLED_BACK_TOTAL: &str = "framegen_frames_rolled_back_total";

/// Counter: old frames deleted by the purge batch.
pub const FRAMES_PURGED_TOTAL: &str = "framegen_frames_purged_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
/// The listener lives only as long as the batch process.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics"),
        Err(e) => tracing::warn!("failed to install Prometheus metrics exporter: {e}"),
    }
}
