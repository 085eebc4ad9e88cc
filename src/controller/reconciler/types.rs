//! # Types
//!
//! Core types for the node reconciler.

use crate::config::SharedSyncOptions;
use crate::constants::{ERROR_BACKOFF_MAX_MINUTES, ERROR_BACKOFF_MIN_MINUTES, RECONCILE_ANNOTATION};
use crate::controller::backoff::FibonacciBackoff;
use crate::provider::azure::{ArmClient, ProviderIdError};
use crate::provider::NodeLabels;
use crate::sync::SyncError;
use k8s_openapi::api::core::v1::Node;
use kube_runtime::events::Recorder;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] anyhow::Error),

    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
}

/// Why a node is not synced
#[derive(Debug, Error)]
pub enum SkipReason {
    #[error("node has no provider ID")]
    NoProviderId,

    #[error(transparent)]
    ProviderId(#[from] ProviderIdError),

    #[error("resource group '{resource_group}' does not match filter '{filter}'")]
    ResourceGroupFiltered {
        resource_group: String,
        filter: String,
    },
}

/// Why a reconciliation was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// Annotation stamped by `tlsctl reconcile`
    ManualCli,
    /// Node change, config change or periodic resync
    Watch,
}

impl TriggerSource {
    #[must_use]
    pub fn from_node(node: &Node) -> Self {
        let manual = node
            .metadata
            .annotations
            .as_ref()
            .is_some_and(|annotations| annotations.contains_key(RECONCILE_ANNOTATION));
        if manual {
            TriggerSource::ManualCli
        } else {
            TriggerSource::Watch
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerSource::ManualCli => "manual-cli",
            TriggerSource::Watch => "watch",
        }
    }
}

/// Backoff state for a specific node
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            backoff: FibonacciBackoff::from_minutes(
                ERROR_BACKOFF_MIN_MINUTES,
                ERROR_BACKOFF_MAX_MINUTES,
            ),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared reconciler context
#[derive(Clone)]
pub struct Reconciler {
    /// ARM client, built once at startup
    pub arm: Arc<ArmClient>,
    pub labels: Arc<dyn NodeLabels>,
    pub recorder: Recorder,
    /// Hot-reloaded by the ConfigMap watch
    pub options: SharedSyncOptions,
    /// Backoff state per node name
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("arm", &self.arm)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(
        arm: Arc<ArmClient>,
        labels: Arc<dyn NodeLabels>,
        recorder: Recorder,
        options: SharedSyncOptions,
    ) -> Self {
        Self {
            arm,
            labels,
            recorder,
            options,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Forget the error history of a node after a successful pass
    pub fn reset_backoff(&self, node_name: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                states.remove(node_name);
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}
