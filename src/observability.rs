use std::net::{SocketAddr, ToSocketAddrs};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use thiserror::Error;

use crate::engine::ErrorKind;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "pitbox_http_requests_total";

/// Histogram: HTTP request latency in seconds. Labels: route.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "pitbox_http_request_duration_seconds";

/// Histogram: slot computation latency in seconds, store reads included.
pub const SLOT_QUERY_DURATION_SECONDS: &str = "pitbox_slot_query_duration_seconds";

/// Histogram: slots returned per query.
pub const SLOTS_RETURNED: &str = "pitbox_slots_returned";

/// Counter: booking attempts. Labels: outcome.
pub const BOOKINGS_TOTAL: &str = "pitbox_bookings_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: requests currently in flight.
pub const REQUESTS_ACTIVE: &str = "pitbox_requests_active";

/// Counter: requests rejected due to the concurrency limit.
pub const REQUESTS_REJECTED_TOTAL: &str = "pitbox_requests_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "pitbox_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "pitbox_wal_flush_batch_size";

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("cannot resolve metrics address {0:?}")]
    Address(String),
    #[error(transparent)]
    Install(#[from] BuildError),
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
/// The listener binds the same host as the API; a host that does not resolve
/// is an error.
pub fn init(bind: &str, port: Option<u16>) -> Result<(), MetricsError> {
    let Some(port) = port else { return Ok(()) };
    let addr = metrics_addr(bind, port)?;
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://{addr}/metrics");
    Ok(())
}

fn metrics_addr(bind: &str, port: u16) -> Result<SocketAddr, MetricsError> {
    (bind, port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| MetricsError::Address(format!("{bind}:{port}")))
}

/// Short label for an error kind, used as the `outcome` of failed requests.
pub fn error_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "invalid",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Internal => "error",
    }
}
