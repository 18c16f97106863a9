//! Ingestion metrics.
//!
//! Counters are recorded through the `metrics` facade and are no-ops until a recorder is
//! installed. Set `ETL_METRICS_ADDR` to expose them through a Prometheus listener.

use crate::constants::ENV_METRICS_ADDR;
use std::net::SocketAddr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Install the Prometheus exporter if `ETL_METRICS_ADDR` is set. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        let Ok(addr_str) = std::env::var(ENV_METRICS_ADDR) else {
            return;
        };
        let addr = match addr_str.parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(e) => {
                warn!("Invalid metrics addr '{}': {}", addr_str, e);
                return;
            }
        };
        match metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
        {
            Ok(()) => {
                register_metrics();
                info!("Prometheus exporter listening on http://{}/metrics", addr);
            }
            Err(e) => warn!("Failed to install Prometheus exporter: {}", e),
        }
    });
}

fn register_metrics() {
    let _ = metrics::counter!("merlin_http_requests_total");
    let _ = metrics::counter!("merlin_http_retries_total");
    let _ = metrics::histogram!("merlin_http_request_duration_seconds");
    let _ = metrics::counter!("merlin_pages_fetched_total");
    let _ = metrics::counter!("merlin_rows_written_total");
    let _ = metrics::counter!("merlin_rows_dropped_total");
}

pub struct HttpMetrics;

impl HttpMetrics {
    pub fn request(duration_secs: f64) {
        metrics::counter!("merlin_http_requests_total").increment(1);
        metrics::histogram!("merlin_http_request_duration_seconds").record(duration_secs);
    }

    pub fn retry() {
        metrics::counter!("merlin_http_retries_total").increment(1);
    }
}

pub struct IngestMetrics;

impl IngestMetrics {
    pub fn page_written(rows: usize, dropped: usize) {
        metrics::counter!("merlin_pages_fetched_total").increment(1);
        metrics::counter!("merlin_rows_written_total").increment(rows as u64);
        if dropped > 0 {
            metrics::counter!("merlin_rows_dropped_total").increment(dropped as u64);
        }
    }

    pub fn job_finished(status: &'static str) {
        metrics::counter!("merlin_job_runs_total", "status" => status).increment(1);
    }
}
