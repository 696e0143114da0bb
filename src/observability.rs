use std::net::SocketAddr;

use crate::model::VacancyCounts;

// ── Request-driven counters ─────────────────────────────────────

/// Counter: reservation attempts that reached the conflict check. Labels: outcome.
pub const RESERVATIONS_TOTAL: &str = "campusd_reservations_total";

/// Counter: reservations moved to cancelled.
pub const CANCELLATIONS_TOTAL: &str = "campusd_reservation_cancellations_total";

/// Counter: operations refused by the role policy. Labels: action.
pub const PERMISSION_DENIED_TOTAL: &str = "campusd_permission_denied_total";

/// Counter: bulk import rows processed. Labels: outcome.
pub const IMPORT_ROWS_TOTAL: &str = "campusd_import_rows_total";

// ── Occupancy gauges (refreshed by the ticker) ──────────────────

pub const ROOMS_VACANT: &str = "campusd_rooms_vacant";

pub const ROOMS_OCCUPIED: &str = "campusd_rooms_occupied";

pub const ROOMS_TOTAL: &str = "campusd_rooms_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

pub fn record_vacancy(counts: &VacancyCounts) {
    metrics::gauge!(ROOMS_VACANT).set(counts.vacant as f64);
    metrics::gauge!(ROOMS_OCCUPIED).set(counts.occupied as f64);
    metrics::gauge!(ROOMS_TOTAL).set(counts.total as f64);
}
