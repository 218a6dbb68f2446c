use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests handled. Labels: operation, status.
pub const REQUESTS_TOTAL: &str = "covers_requests_total";

/// Histogram: request latency in seconds. Labels: operation.
pub const REQUEST_DURATION_SECONDS: &str = "covers_request_duration_seconds";

/// Counter: admission decisions. Labels: outcome.
pub const ADMISSIONS_TOTAL: &str = "covers_admissions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "covers_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "covers_wal_flush_batch_size";

/// Counter: WAL compactions run by the background compactor.
pub const WAL_COMPACTIONS_TOTAL: &str = "covers_wal_compactions_total";

/// Install the Prometheus exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Request operations, as used in metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateReservation,
    CreateInventory,
    UpdateInventory,
    ListInventory,
    ListReservations,
    Availability,
}

impl Operation {
    pub fn label(self) -> &'static str {
        match self {
            Operation::CreateReservation => "create_reservation",
            Operation::CreateInventory => "create_inventory",
            Operation::UpdateInventory => "update_inventory",
            Operation::ListInventory => "list_inventory",
            Operation::ListReservations => "list_reservations",
            Operation::Availability => "availability",
        }
    }
}

/// Record one finished request.
pub fn record_request(op: Operation, status: u16, started: std::time::Instant) {
    metrics::counter!(REQUESTS_TOTAL, "operation" => op.label(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "operation" => op.label())
        .record(started.elapsed().as_secs_f64());
}
