//! # Metrics
//!
//! Prometheus metrics for monitoring the operator.
//!
//! ## Metrics Exposed
//!
//! - `console_ui_reconciliations_total` - Total number of reconciliation passes
//! - `console_ui_reconciliation_errors_total` - Failed passes by error class
//! - `console_ui_reconciliation_duration_seconds` - Duration of reconciliation passes
//! - `console_ui_requeues_total` - Passes that changed the cluster and asked for a follow-up
//! - `console_ui_store_writes_total` - Writes against the store by kind and operation
//! - `console_ui_dependency_not_ready_total` - Kinds skipped because an input was not available yet
//! - `console_ui_cleanup_errors_total` - Failed deletions of deprecated resources

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "console_ui_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "console_ui_reconciliation_errors_total",
            "Total number of failed reconciliation passes by error class",
        ),
        &["class"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "console_ui_reconciliation_duration_seconds",
            "Duration of reconciliation passes in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "console_ui_requeues_total",
        "Total number of passes that changed the cluster and requested a follow-up pass",
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static STORE_WRITES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "console_ui_store_writes_total",
            "Total number of writes against the store by kind and operation",
        ),
        &["kind", "operation"],
    )
    .expect("Failed to create STORE_WRITES_TOTAL metric - this should never happen")
});

static DEPENDENCY_NOT_READY_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "console_ui_dependency_not_ready_total",
            "Total number of kinds skipped because an input was not available yet",
        ),
        &["kind"],
    )
    .expect("Failed to create DEPENDENCY_NOT_READY_TOTAL metric - this should never happen")
});

static CLEANUP_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "console_ui_cleanup_errors_total",
        "Total number of failed deletions of deprecated resources",
    )
    .expect("Failed to create CLEANUP_ERRORS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STORE_WRITES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DEPENDENCY_NOT_READY_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLEANUP_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(class: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[class]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_requeues() {
    REQUEUES_TOTAL.inc();
}

/// Record one write (`create`, `update`, `recreate`, `delete`, `status`)
pub fn record_store_write(kind: &str, operation: &str) {
    STORE_WRITES_TOTAL
        .with_label_values(&[kind, operation])
        .inc();
}

pub fn increment_dependency_not_ready(kind: &str) {
    DEPENDENCY_NOT_READY_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_cleanup_errors() {
    CLEANUP_ERRORS_TOTAL.inc();
}

/// Text exposition of every registered metric
#[must_use]
pub fn gather_text() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&REGISTRY.gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
