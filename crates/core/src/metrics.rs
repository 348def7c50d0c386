//! Prometheus metrics for core components.
//!
//! Statics are defined here and registered into the server's registry.

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Dispatcher
// =============================================================================

/// Tasks handed from the dispatcher to the worker pool.
pub static DISPATCHED_TASKS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "hubsync_dispatched_tasks_total",
        "Total mirror tasks dispatched to the worker pool",
    )
    .unwrap()
});

/// Dispatcher retry sleeps by reason.
pub static DISPATCH_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "hubsync_dispatch_retries_total",
            "Dispatcher iterations that found no work or hit a store error",
        ),
        &["reason"], // "not_found", "store_error"
    )
    .unwrap()
});

// =============================================================================
// Worker pool
// =============================================================================

/// Slots currently bound to a running task.
pub static BUSY_SLOTS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("hubsync_busy_slots", "Worker slots currently running a sync").unwrap()
});

/// Preemptions: a running task cancelled so its mirror could be re-synced.
pub static PREEMPTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "hubsync_preemptions_total",
        "Running tasks cancelled in favor of a newer task for the same mirror",
    )
    .unwrap()
});

/// Operator re-run requests accepted.
pub static RERUN_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "hubsync_rerun_requests_total",
        "Manual re-run requests pushed to the priority queue",
    )
    .unwrap()
});

// =============================================================================
// Sync workers
// =============================================================================

/// Sync outcomes by result.
pub static SYNC_RESULTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("hubsync_sync_results_total", "Completed sync runs by outcome"),
        &["outcome"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Wall-clock duration of sync runs.
pub static SYNC_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "hubsync_sync_duration_seconds",
            "Duration of a single sync run",
        )
        .buckets(vec![1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]),
    )
    .unwrap()
});

/// Every core metric, for registration into the server's registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(DISPATCHED_TASKS.clone()),
        Box::new(DISPATCH_RETRIES.clone()),
        Box::new(BUSY_SLOTS.clone()),
        Box::new(PREEMPTIONS.clone()),
        Box::new(RERUN_REQUESTS.clone()),
        Box::new(SYNC_RESULTS.clone()),
        Box::new(SYNC_DURATION.clone()),
    ]
}
