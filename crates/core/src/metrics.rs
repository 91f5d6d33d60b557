//! Metric names and descriptions.
//!
//! Every Prometheus metric emitted by the workspace is named here. Callers
//! use these constants with `metrics::counter!()`, `metrics::gauge!()` and
//! `metrics::histogram!()`.
//!
//! # Naming
//!
//! - prefix: `skywatch_`
//! - component: `scan_`, `broadcast_`, `daemon_`
//! - suffix: `_total` (counter), `_seconds` (histogram), none (gauge)
//!
//! ```ignore
//! metrics::counter!(skywatch_core::metrics::SCAN_JOBS_TOTAL, "outcome" => "succeeded").increment(1);
//! ```

// ─── Label keys ──────────────────────────────────────────────────────

/// Provider label key (aws, gcp, azure)
pub const LABEL_PROVIDER: &str = "provider";

/// Scan outcome label key (succeeded, aborted, failed)
pub const LABEL_OUTCOME: &str = "outcome";

/// Event type label key
pub const LABEL_EVENT: &str = "event";

// ─── Scan metrics ────────────────────────────────────────────────────

/// Scan: finished jobs (counter, label: outcome)
pub const SCAN_JOBS_TOTAL: &str = "skywatch_scan_jobs_total";

/// Scan: job wall-clock duration (histogram, seconds)
pub const SCAN_DURATION_SECONDS: &str = "skywatch_scan_duration_seconds";

/// Scan: failed or timed-out provider fetches (counter, label: provider)
pub const SCAN_FETCH_FAILURES_TOTAL: &str = "skywatch_scan_fetch_failures_total";

/// Scan: progress of the running job, 0-100 (gauge)
pub const SCAN_PROGRESS: &str = "skywatch_scan_progress";

/// Scan: resources in the published snapshot (gauge)
pub const SCAN_SNAPSHOT_RESOURCES: &str = "skywatch_scan_snapshot_resources";

// ─── Broadcast metrics ───────────────────────────────────────────────

/// Broadcast: registered subscribers (gauge)
pub const BROADCAST_SUBSCRIBERS: &str = "skywatch_broadcast_subscribers";

/// Broadcast: events accepted by the hub (counter, label: event)
pub const BROADCAST_EVENTS_PUBLISHED_TOTAL: &str = "skywatch_broadcast_events_published_total";

/// Broadcast: per-subscriber deliveries dropped on a full outbox (counter)
pub const BROADCAST_EVENTS_DROPPED_TOTAL: &str = "skywatch_broadcast_events_dropped_total";

/// Broadcast: subscribers evicted for being too slow (counter)
pub const BROADCAST_SUBSCRIBERS_EVICTED_TOTAL: &str =
    "skywatch_broadcast_subscribers_evicted_total";

// ─── Daemon metrics ──────────────────────────────────────────────────

/// Daemon: uptime (gauge, seconds)
pub const DAEMON_UPTIME_SECONDS: &str = "skywatch_daemon_uptime_seconds";

/// Daemon: build info (gauge, always 1, label: version)
pub const DAEMON_BUILD_INFO: &str = "skywatch_daemon_build_info";

// ─── Histogram buckets ───────────────────────────────────────────────

/// Scan duration buckets (seconds).
///
/// Provider listings are network bound; 100ms to 10min.
pub const SCAN_DURATION_BUCKETS: [f64; 10] =
    [0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Register HELP text for every metric.
///
/// Call once after the global recorder is installed.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    describe_counter!(SCAN_JOBS_TOTAL, "Total number of finished scan jobs by outcome");
    describe_histogram!(
        SCAN_DURATION_SECONDS,
        "Wall-clock duration of a scan job in seconds"
    );
    describe_counter!(
        SCAN_FETCH_FAILURES_TOTAL,
        "Provider fetches that failed or exceeded their deadline"
    );
    describe_gauge!(SCAN_PROGRESS, "Progress of the current scan job (0-100)");
    describe_gauge!(
        SCAN_SNAPSHOT_RESOURCES,
        "Number of resources in the published inventory snapshot"
    );

    describe_gauge!(BROADCAST_SUBSCRIBERS, "Number of live event subscribers");
    describe_counter!(
        BROADCAST_EVENTS_PUBLISHED_TOTAL,
        "Total number of events accepted by the broadcast hub"
    );
    describe_counter!(
        BROADCAST_EVENTS_DROPPED_TOTAL,
        "Deliveries dropped because a subscriber outbox was full"
    );
    describe_counter!(
        BROADCAST_SUBSCRIBERS_EVICTED_TOTAL,
        "Subscribers disconnected for falling too far behind"
    );

    describe_gauge!(DAEMON_UPTIME_SECONDS, "Skywatch daemon uptime in seconds");
    describe_gauge!(DAEMON_BUILD_INFO, "Build information (always 1, with version label)");
}
