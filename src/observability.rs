use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reserve attempts. Labels: kind, outcome.
pub const RESERVATIONS_TOTAL: &str = "slotledger_reservations_total";

/// Histogram: reserve latency in seconds, lock wait included.
pub const RESERVE_DURATION_SECONDS: &str = "slotledger_reserve_duration_seconds";

/// Counter: holds removed by cancel / cancel_consumer.
pub const CANCELLATIONS_TOTAL: &str = "slotledger_cancellations_total";

/// Counter: per-item lock acquisitions that hit the caller's bound.
pub const LOCK_TIMEOUTS_TOTAL: &str = "slotledger_lock_timeouts_total";

/// Counter: availability evaluations on the read path. Labels: path (single, batch, catalog).
pub const AVAILABILITY_QUERIES_TOTAL: &str = "slotledger_availability_queries_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: inventory items loaded.
pub const ITEMS_ACTIVE: &str = "slotledger_items_active";

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "slotledger_journal_flush_duration_seconds";

/// Histogram: events per journal flush.
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "slotledger_journal_flush_batch_size";

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
