// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the registrar controller.
//!
//! All metrics live in a process-wide registry with the namespace prefix
//! `registrar_` and are exposed via the `/metrics` endpoint.
//!
//! # Metrics
//!
//! - `registrar_updates_received_total{ingress, action}` - ingress events observed
//! - `registrar_updates_applied_total{hostname, op}` - records the mutator accepted
//! - `registrar_updates_rejected_total` - records dropped by the prune stage

use prometheus::{CounterVec, Encoder, IntCounter, Opts, Registry, TextEncoder};
use std::sync::LazyLock;

/// Namespace prefix for all registrar metrics
const METRICS_NAMESPACE: &str = "registrar";

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via the `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Total number of ingress events observed by the handler
///
/// Labels:
/// - `ingress`: name of the ingress the event concerns
/// - `action`: event kind (`add`, `modify`, `delete`)
pub static UPDATES_RECEIVED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_updates_received_total"),
        "Total number of ingress events observed by the handler",
    );
    let counter = CounterVec::new(opts, &["ingress", "action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of records successfully applied to the zone
///
/// Labels:
/// - `hostname`: the record name that was written or withdrawn
/// - `op`: mutation kind (`upsert`, `delete`)
pub static UPDATES_APPLIED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_updates_applied_total"),
        "Total number of records successfully applied to the zone",
    );
    let counter = CounterVec::new(opts, &["hostname", "op"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of records dropped by the prune stage
///
/// Counts both out-of-zone records and conflicting claims.
pub static UPDATES_REJECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        format!("{METRICS_NAMESPACE}_updates_rejected_total"),
        "Total number of records dropped by the prune stage",
    )
    .unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Record an observed ingress event.
pub fn record_update_received(ingress: &str, action: &str) {
    UPDATES_RECEIVED_TOTAL
        .with_label_values(&[ingress, action])
        .inc();
}

/// Record a successfully applied zone mutation.
pub fn record_update_applied(hostname: &str, op: &str) {
    UPDATES_APPLIED_TOTAL
        .with_label_values(&[hostname, op])
        .inc();
}

/// Record `count` pruned records.
pub fn record_updates_rejected(count: u64) {
    UPDATES_REJECTED_TOTAL.inc_by(count);
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
