// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the registrar controller.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Reconciliation Constants
// ============================================================================

/// Default full-resync period for the ingress watcher (15 minutes)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 900;

/// Capacity of the bounded change queue between watcher and reconciler
pub const UPDATE_QUEUE_CAPACITY: usize = 64;

/// Idle sleep between queue polls when there is nothing to batch (100 ms)
pub const BATCH_IDLE_SLEEP_MS: u64 = 100;

// ============================================================================
// DNS Protocol Constants
// ============================================================================

/// Standard DNS service port used when querying authoritative nameservers
pub const DNS_PORT: u16 = 53;

/// TTL applied to every CNAME record the registrar writes (5 minutes)
pub const DEFAULT_CNAME_TTL_SECS: i64 = 300;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path for the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address for the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";
