//! Prometheus metrics for the HTTP server.
//!
//! This module provides:
//! - HTTP request metrics (latency, counts, in flight)
//! - Job counts per status and orchestrator state (collected on scrape)
//! - Registration of the core pipeline metrics

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use regex_lite::Regex;
use tracing::{error, warn};

use discshelf_core::job::{JobStatus, JobStore};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "discshelf_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
        ]),
        &["method", "path", "status"],
    )
    .expect("valid metric")
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("discshelf_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .expect("valid metric")
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "discshelf_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .expect("valid metric")
});

// =============================================================================
// Pipeline state
// =============================================================================

/// Jobs per status.
pub static JOBS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("discshelf_jobs_by_status", "Current number of jobs per status"),
        &["status"],
    )
    .expect("valid metric")
});

/// Whether the orchestrator is running.
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "discshelf_orchestrator_running",
        "Whether the orchestrator is running (1) or not (0)",
    )
    .expect("valid metric")
});

/// Drives with a rip in progress.
pub static DRIVES_BUSY: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("discshelf_drives_busy", "Drives with a rip in progress")
        .expect("valid metric")
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    let local: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUEST_DURATION.clone()),
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()),
        Box::new(JOBS_BY_STATUS.clone()),
        Box::new(ORCHESTRATOR_RUNNING.clone()),
        Box::new(DRIVES_BUSY.clone()),
    ];

    // Core metrics (stages, backends, external services)
    for metric in local
        .into_iter()
        .chain(discshelf_core::metrics::all_metrics())
    {
        if let Err(e) = registry.register(metric) {
            error!("Failed to register metric: {}", e);
        }
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state.
///
/// Called before encoding so a scrape sees live values.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let status = state.orchestrator().status();
    ORCHESTRATOR_RUNNING.set(i64::from(status.running));
    DRIVES_BUSY.set(status.busy_drives.len() as i64);

    match state.store().count_by_status() {
        Ok(counts) => {
            for job_status in JobStatus::ALL {
                let count = counts.get(&job_status).copied().unwrap_or(0);
                JOBS_BY_STATUS
                    .with_label_values(&[job_status.as_str()])
                    .set(count as i64);
            }
        }
        Err(e) => warn!("Failed to count jobs for metrics: {}", e),
    }
}

static NUMERIC_SEGMENT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/\d+(/|$)").ok());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    match NUMERIC_SEGMENT.as_ref() {
        Some(re) => re.replace_all(path, "/{id}$1").into_owned(),
        None => path.to_string(),
    }
}
