//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Job creation and stage outcomes
//! - Rip and encode durations
//! - Identification confidence
//! - Placement retries
//! - External services (TMDB, Anthropic, Pushover)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs created by the drive monitor.
pub static JOBS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("discshelf_jobs_created_total", "Total jobs created").expect("valid metric")
});

/// Stage outcomes by stage and result.
pub static STAGE_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "discshelf_stage_outcomes_total",
            "Total stage completions by outcome",
        ),
        // stage: "rip", "encode", "identify", "move"
        // outcome: "success", "failed", "review", "retry"
        &["stage", "outcome"],
    )
    .expect("valid metric")
});

/// Jobs reset or flagged by oversight.
pub static OVERSIGHT_RESETS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "discshelf_oversight_resets_total",
            "Jobs reset by oversight",
        ),
        &["kind"], // "rip_failed", "encode_requeued", "identify_requeued", "stuck_encoding"
    )
    .expect("valid metric")
});

// =============================================================================
// Backends
// =============================================================================

/// Rip duration in seconds.
pub static RIP_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("discshelf_rip_duration_seconds", "Duration of disc rips")
            .buckets(vec![60.0, 300.0, 600.0, 1200.0, 1800.0, 3600.0, 7200.0]),
        &["result"],
    )
    .expect("valid metric")
});

/// Encode duration in seconds.
pub static ENCODE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("discshelf_encode_duration_seconds", "Duration of encodes")
            .buckets(vec![300.0, 900.0, 1800.0, 3600.0, 7200.0, 14400.0, 28800.0]),
        &["result"],
    )
    .expect("valid metric")
});

/// Confidence of the best identification match.
pub static MATCH_CONFIDENCE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discshelf_match_confidence",
            "Confidence of the selected identification",
        )
        .buckets(vec![0.0, 0.25, 0.5, 0.6, 0.7, 0.8, 0.85, 0.9, 0.95, 1.0]),
        &["source"], // "search", "ai"
    )
    .expect("valid metric")
});

/// Placement retries caused by a missing library root.
pub static MOVE_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "discshelf_move_retries_total",
        "Placement retries for a missing destination",
    )
    .expect("valid metric")
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discshelf_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .expect("valid metric")
});

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "discshelf_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .expect("valid metric")
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(JOBS_CREATED.clone()),
        Box::new(STAGE_OUTCOMES.clone()),
        Box::new(OVERSIGHT_RESETS.clone()),
        Box::new(RIP_DURATION.clone()),
        Box::new(ENCODE_DURATION.clone()),
        Box::new(MATCH_CONFIDENCE.clone()),
        Box::new(MOVE_RETRIES.clone()),
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
    ]
}

/// Record a stage outcome.
pub fn record_stage(stage: &str, outcome: &str) {
    STAGE_OUTCOMES.with_label_values(&[stage, outcome]).inc();
}
