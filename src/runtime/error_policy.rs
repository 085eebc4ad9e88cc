//! # Error Policy
//!
//! Retry scheduling for failed node reconciliations and classification of watch
//! stream errors.

use crate::controller::reconciler::{BackoffState, Reconciler, ReconcilerError};
use crate::observability;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed node with its own Fibonacci backoff
pub fn handle_reconciliation_error(
    node: Arc<Node>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = node.name_any();
    error!(node.name = %name, error = %error, "Reconciliation error");
    observability::metrics::increment_reconciliation_errors();

    let (delay, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(name.clone()).or_insert_with(BackoffState::new);
            state.increment_error();
            (state.backoff.next_backoff(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (Duration::from_secs(60), 0)
        }
    };

    info!(
        node.name = %name,
        error_count,
        "Retrying in {}s (trigger source: error-backoff)",
        delay.as_secs()
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// Class of a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    TooManyRequests,
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify from the error's debug representation
    #[must_use]
    pub fn classify(error_string: &str) -> Self {
        // 404 first: a plain-text 404 surfaces as a decode error mentioning WatchFailed
        let is_not_found = error_string.contains("ObjectNotFound")
            || error_string.contains("404")
            || error_string.contains("not found");
        if (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found
        {
            WatchErrorKind::Unauthorized
        } else if error_string.contains("410")
            || error_string.contains("too old resource version")
            || error_string.contains("Expired")
            || error_string.contains("Gone")
        {
            WatchErrorKind::Expired
        } else if error_string.contains("429")
            || error_string.contains("storage is (re)initializing")
            || error_string.contains("TooManyRequests")
        {
            WatchErrorKind::TooManyRequests
        } else if is_not_found {
            WatchErrorKind::NotFound
        } else {
            WatchErrorKind::Other
        }
    }
}

/// Handle a watch stream error.
///
/// Returns `None` to drop the item and let the stream restart, `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    match WatchErrorKind::classify(error_string) {
        WatchErrorKind::Unauthorized => {
            error!("Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired");
            error!("Verify the controller can list nodes:");
            error!("  kubectl auth can-i list nodes --as=system:serviceaccount:<namespace>:tag-label-sync");
            warn!(
                "Waiting {}s before retrying watch...",
                watch_restart_delay_secs
            );
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
        WatchErrorKind::Expired => {
            warn!(error_type = "410", "Watch resource version expired, watch will restart");
            None
        }
        WatchErrorKind::TooManyRequests => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!(
                "API server throttling or reinitializing (429), backing off for {}ms before restart...",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorKind::NotFound => {
            // Nodes get deleted while queued
            warn!("Node not found (404): {}", error_string);
            Some(())
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
            None
        }
    }
}
