//! # Slow Query Sync Metrics
//!
//! OpenTelemetry instruments recorded by the syncer. Without an installed
//! meter provider these are no-ops.
//!
//! ```rust
//! use rollout_core::metrics::sync_instances_total;
//! use opentelemetry::KeyValue;
//!
//! sync_instances_total().add(1, &[KeyValue::new("outcome", "synced")]);
//! ```

use opentelemetry::metrics::{Counter, Histogram, Meter};
use std::sync::OnceLock;

static SLOW_QUERY_METER: OnceLock<Meter> = OnceLock::new();

fn meter() -> &'static Meter {
    SLOW_QUERY_METER
        .get_or_init(|| opentelemetry::global::meter_provider().meter("rollout-slow-query-sync"))
}

/// Sync cycles started
///
/// Labels:
/// - trigger: `interval` or `request`
pub fn sync_cycles_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.slow_query.sync.cycles.total")
        .with_description("Total number of slow query sync cycles started")
        .build()
}

/// Per-instance sync outcomes
///
/// Labels:
/// - outcome: `synced`, `skipped` or `failed`
/// - engine: engine identifier
pub fn sync_instances_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.slow_query.sync.instances.total")
        .with_description("Total number of instance sync units by outcome")
        .build()
}

/// Wall time of one cycle, in milliseconds
pub fn sync_cycle_duration() -> Histogram<f64> {
    meter()
        .f64_histogram("rollout.slow_query.sync.cycle.duration")
        .with_description("Slow query sync cycle duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Slow query day records written
pub fn records_upserted_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.slow_query.records.upserted.total")
        .with_description("Total number of slow query day records written")
        .build()
}

/// Slow query day records removed by retention
pub fn records_deleted_total() -> Counter<u64> {
    meter()
        .u64_counter("rollout.slow_query.records.deleted.total")
        .with_description("Total number of slow query day records removed by retention")
        .build()
}
