// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for keyroll.
//!
//! All metrics carry the `keyroll_` prefix and live in [`METRICS_REGISTRY`].
//! keyroll is not a long-running server, so instead of an HTTP endpoint the
//! registry is written to a file for the node exporter's textfile collector
//! (see [`write_metrics_file`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use keyroll::metrics::{gather_metrics, record_convergence};
//!
//! record_convergence("example.com", "KSK", "satisfied");
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{CounterVec, Encoder, GaugeVec, Opts, Registry, TextEncoder};
use std::path::Path;
use std::sync::LazyLock;

use crate::constants::METRICS_NAMESPACE;

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Convergence Metrics
// ============================================================================

/// Total number of convergence passes by zone, key type and outcome
///
/// Labels:
/// - `zone`: Zone of the key resource
/// - `key_type`: `KSK` or `ZSK`
/// - `outcome`: `satisfied`, `created`, `generation_failed`, `would_create`,
///   `destroyed` or `error`
pub static CONVERGENCE_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_convergence_passes_total"),
        "Total number of convergence passes by zone, key type and outcome",
    );
    let counter = CounterVec::new(opts, &["zone", "key_type", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Keys that were valid at the time of the last pass
pub static VALID_KEYS: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_valid_keys"),
        "Number of keys valid at the time of the last pass by zone and key type",
    );
    let gauge = GaugeVec::new(opts, &["zone", "key_type"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Key Lifecycle Metrics
// ============================================================================

/// Total number of key pairs generated
pub static KEYS_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_keys_created_total"),
        "Total number of key pairs generated by zone and key type",
    );
    let counter = CounterVec::new(opts, &["zone", "key_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of key pairs removed, either purged after their deletion
/// time or destroyed with `ensure: absent`
pub static KEYS_REMOVED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_keys_removed_total"),
        "Total number of key pairs removed by zone, key type and reason",
    );
    let counter = CounterVec::new(opts, &["zone", "key_type", "reason"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of failed key generations
pub static KEYGEN_FAILURES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_keygen_failures_total"),
        "Total number of failed key generations by zone and key type",
    );
    let counter = CounterVec::new(opts, &["zone", "key_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record the outcome of one convergence pass
pub fn record_convergence(zone: &str, key_type: &str, outcome: &str) {
    CONVERGENCE_TOTAL
        .with_label_values(&[zone, key_type, outcome])
        .inc();
}

pub fn record_valid_keys(zone: &str, key_type: &str, count: usize) {
    #[allow(clippy::cast_precision_loss)]
    VALID_KEYS
        .with_label_values(&[zone, key_type])
        .set(count as f64);
}

pub fn record_key_created(zone: &str, key_type: &str) {
    KEYS_CREATED_TOTAL.with_label_values(&[zone, key_type]).inc();
}

/// Record removed key pairs
///
/// # Arguments
/// * `reason` - `purged` or `destroyed`
pub fn record_keys_removed(zone: &str, key_type: &str, reason: &str, count: usize) {
    if count == 0 {
        return;
    }
    #[allow(clippy::cast_precision_loss)]
    KEYS_REMOVED_TOTAL
        .with_label_values(&[zone, key_type, reason])
        .inc_by(count as f64);
}

pub fn record_keygen_failure(zone: &str, key_type: &str) {
    KEYGEN_FAILURES_TOTAL
        .with_label_values(&[zone, key_type])
        .inc();
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

/// Write all metrics to `path` for a textfile collector.
///
/// The file is written next to its destination and renamed into place, so a
/// collector never reads a partial file.
///
/// # Errors
/// Returns an error if encoding or writing fails
pub fn write_metrics_file(path: &Path) -> anyhow::Result<()> {
    use anyhow::Context;

    let text = gather_metrics().context("Failed to encode metrics")?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");

    std::fs::write(&staging, text)
        .with_context(|| format!("Failed to write metrics to {}", Path::new(&staging).display()))?;
    std::fs::rename(&staging, path)
        .with_context(|| format!("Failed to move metrics file into {}", path.display()))?;
    Ok(())
}
