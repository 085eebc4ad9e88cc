//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `tag_label_sync_reconciliations_total` - Total number of node reconciliations
//! - `tag_label_sync_reconciliation_errors_total` - Total number of failed reconciliations
//! - `tag_label_sync_reconciliation_duration_seconds` - Duration of reconciliations
//! - `tag_label_sync_labels_applied_total` - Node labels added or overwritten from tags
//! - `tag_label_sync_tags_applied_total` - ARM tags added or overwritten from labels
//! - `tag_label_sync_conflicts_total{direction}` - Keys left alone because values differ
//! - `tag_label_sync_skipped_keys_total{reason}` - Keys skipped by validation or quota
//! - `tag_label_sync_arm_operations_total{operation}` - ARM requests
//! - `tag_label_sync_arm_operation_errors_total{operation}` - Failed ARM requests
//! - `tag_label_sync_arm_operation_duration_seconds{operation}` - Duration of ARM requests
//! - `tag_label_sync_requeues_total{reason}` - Requeues by reason

use anyhow::Result;
use prometheus::{Histogram, HistogramVec, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tag_label_sync_reconciliations_total",
        "Total number of node reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tag_label_sync_reconciliation_errors_total",
        "Total number of failed node reconciliations",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "tag_label_sync_reconciliation_duration_seconds",
            "Duration of node reconciliation in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static LABELS_APPLIED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tag_label_sync_labels_applied_total",
        "Total number of node labels added or overwritten from ARM tags",
    )
    .expect("Failed to create LABELS_APPLIED_TOTAL metric - this should never happen")
});

static TAGS_APPLIED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "tag_label_sync_tags_applied_total",
        "Total number of ARM tags added or overwritten from node labels",
    )
    .expect("Failed to create TAGS_APPLIED_TOTAL metric - this should never happen")
});

static CONFLICTS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "tag_label_sync_conflicts_total",
            "Total number of keys left unchanged because tag and label values differ",
        ),
        &["direction"],
    )
    .expect("Failed to create CONFLICTS_TOTAL metric - this should never happen")
});

static SKIPPED_KEYS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "tag_label_sync_skipped_keys_total",
            "Total number of keys skipped by validation or tag quota",
        ),
        &["reason"],
    )
    .expect("Failed to create SKIPPED_KEYS_TOTAL metric - this should never happen")
});

static ARM_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "tag_label_sync_arm_operations_total",
            "Total number of Azure Resource Manager requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create ARM_OPERATIONS_TOTAL metric - this should never happen")
});

static ARM_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "tag_label_sync_arm_operation_errors_total",
            "Total number of failed Azure Resource Manager requests by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create ARM_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static ARM_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        prometheus::HistogramOpts::new(
            "tag_label_sync_arm_operation_duration_seconds",
            "Duration of Azure Resource Manager requests in seconds by operation",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
        &["operation"],
    )
    .expect("Failed to create ARM_OPERATION_DURATION metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "tag_label_sync_requeues_total",
            "Total number of reconciliation requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Error documentation is provided in doc comments"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(LABELS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TAGS_APPLIED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONFLICTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SKIPPED_KEYS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARM_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARM_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARM_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_labels_applied(count: usize) {
    LABELS_APPLIED_TOTAL.inc_by(count as u64);
}

pub fn increment_tags_applied(count: usize) {
    TAGS_APPLIED_TOTAL.inc_by(count as u64);
}

pub fn increment_conflicts(direction: &str) {
    CONFLICTS_TOTAL.with_label_values(&[direction]).inc();
}

pub fn increment_skipped_keys(reason: &str) {
    SKIPPED_KEYS_TOTAL.with_label_values(&[reason]).inc();
}

#[cfg(test)]
pub(crate) fn skipped_keys(reason: &str) -> u64 {
    SKIPPED_KEYS_TOTAL.with_label_values(&[reason]).get()
}

/// Record a completed ARM request
pub fn record_arm_operation(operation: &str, duration: f64) {
    ARM_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    ARM_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_arm_operation_errors(operation: &str) {
    ARM_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_requeues_total(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
