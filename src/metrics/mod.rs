//! Prometheus metrics for ingestion jobs and fleet runs
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or is never called, metric operations are no-ops.
//! [`serve`] exposes them as `GET /metrics` in Prometheus text format.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, CounterVec, Encoder, Gauge,
    HistogramVec, TextEncoder,
};
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::net::TcpListener;

// ============================================================================
// Metrics Storage
// ============================================================================

struct IngestMetrics {
    jobs_total: CounterVec,
    job_duration: HistogramVec,
    fleet_runs_total: CounterVec,
    fleet_in_progress: Gauge,
}

static INGEST_METRICS: OnceLock<IngestMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Register all metrics with the default registry
///
/// Idempotent; a failed registration leaves metrics disabled.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = IngestMetrics {
        jobs_total: register_counter_vec!(
            "ercrowd_jobs_total",
            "Ingestion jobs by source and outcome",
            &["source", "outcome"]
        )?,
        job_duration: register_histogram_vec!(
            "ercrowd_job_duration_seconds",
            "Time spent on one hospital job in seconds",
            &["source"],
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
        )?,
        fleet_runs_total: register_counter_vec!(
            "ercrowd_fleet_runs_total",
            "Fleet runs by trigger",
            &["trigger"]
        )?,
        fleet_in_progress: register_gauge!(
            "ercrowd_fleet_in_progress",
            "Whether a fleet run is in flight (1 = yes, 0 = no)"
        )?,
    };

    INGEST_METRICS
        .set(metrics)
        .map_err(|_| "Ingestion metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

pub fn metrics_initialized() -> bool {
    INGEST_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Render all registered metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

// ============================================================================
// HTTP Exposition
// ============================================================================

/// Router serving `GET /metrics`
pub fn router() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> Response {
    match gather_metrics() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serve [`router`] on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Metrics endpoint listening");
    }
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Record one finished job
pub fn record_job(source: &str, outcome: &str, elapsed: Duration) {
    let Some(m) = INGEST_METRICS.get() else {
        return;
    };

    m.jobs_total.with_label_values(&[source, outcome]).inc();
    m.job_duration
        .with_label_values(&[source])
        .observe(elapsed.as_secs_f64());
}

/// Count a fleet run started by `trigger` (`scheduled` or `manual`)
pub fn record_fleet_run(trigger: &str) {
    if let Some(m) = INGEST_METRICS.get() {
        m.fleet_runs_total.with_label_values(&[trigger]).inc();
    }
}

/// Marks a fleet run in flight until dropped
pub struct FleetGauge {
    active: bool,
}

impl FleetGauge {
    pub fn start() -> Self {
        match INGEST_METRICS.get() {
            Some(m) => {
                m.fleet_in_progress.set(1.0);
                Self { active: true }
            }
            None => Self { active: false },
        }
    }
}

impl Drop for FleetGauge {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(m) = INGEST_METRICS.get() {
            m.fleet_in_progress.set(0.0);
        }
    }
}
