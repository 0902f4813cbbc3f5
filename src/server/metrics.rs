use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all report worker metrics
const PREFIX: &str = "wallet_report";

lazy_static! {
    // Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref EXPORTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_exports_total"), "Finished exports by outcome"),
        &["outcome"]
    ).expect("Failed to create exports_total metric");

    pub static ref ROWS_WRITTEN_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_rows_written_total"),
        "Report rows written across all exports"
    ).expect("Failed to create rows_written_total metric");

    pub static ref EXPORT_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            format!("{PREFIX}_export_duration_seconds"),
            "Export duration in seconds"
        )
        .buckets(vec![0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0])
    ).expect("Failed to create export_duration_seconds metric");

    pub static ref EXPORTS_RUNNING: Gauge = Gauge::new(
        format!("{PREFIX}_exports_running"),
        "Exports currently running in this process"
    ).expect("Failed to create exports_running metric");

    pub static ref DISPATCH_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_dispatch_total"), "Dispatch decisions by action"),
        &["action"]
    ).expect("Failed to create dispatch_total metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(EXPORTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(ROWS_WRITTEN_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(EXPORT_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(EXPORTS_RUNNING.clone()));
    let _ = REGISTRY.register(Box::new(DISPATCH_TOTAL.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record a finished export
pub fn record_export(outcome: &str, rows_written: u64, duration: Duration) {
    EXPORTS_TOTAL.with_label_values(&[outcome]).inc();
    ROWS_WRITTEN_TOTAL.inc_by(rows_written as f64);
    EXPORT_DURATION_SECONDS.observe(duration.as_secs_f64());
}

pub fn export_started() {
    EXPORTS_RUNNING.inc();
}

pub fn export_finished() {
    EXPORTS_RUNNING.dec();
}

/// Record a dispatch decision
pub fn record_dispatch(action: &str) {
    DISPATCH_TOTAL.with_label_values(&[action]).inc();
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_else(|_| String::from(""));
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}

pub fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}
