//! # ConfigMap Watch
//!
//! Loads the sync options ConfigMap at startup and hot-reloads it afterwards.
//! Every effective change of the options requests a reconcile of all nodes.

use crate::config::{ConfigOptions, SharedSyncOptions};
use anyhow::{Context, Result};
use futures::channel::mpsc;
use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use kube_runtime::watcher;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

/// Requests a reconcile of every watched node.
///
/// The controller subscribes a fresh receiver each time its watch loop (re)starts;
/// only the most recent subscriber is notified. Requests made while one is already
/// pending collapse into it.
#[derive(Debug, Clone, Default)]
pub struct ReconcileTrigger {
    sender: Arc<Mutex<Option<mpsc::Sender<()>>>>,
}

impl ReconcileTrigger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the receiving side for a new controller instance
    pub fn subscribe(&self) -> mpsc::Receiver<()> {
        let (tx, rx) = mpsc::channel(0);
        match self.sender.lock() {
            Ok(mut sender) => *sender = Some(tx),
            Err(e) => warn!("Failed to lock reconcile trigger: {}", e),
        }
        rx
    }

    /// Request a reconcile of all nodes. Returns whether a subscriber was notified.
    pub fn fire(&self) -> bool {
        let Ok(mut guard) = self.sender.lock() else {
            return false;
        };
        let Some(sender) = guard.as_mut() else {
            debug!("No controller subscribed yet, reconcile-all request dropped");
            return false;
        };
        match sender.try_send(()) {
            Ok(()) => true,
            // A request is already queued
            Err(e) if e.is_full() => true,
            Err(_) => {
                *guard = None;
                false
            }
        }
    }
}

/// Read the sync options ConfigMap. A missing ConfigMap yields the defaults.
///
/// # Errors
///
/// Returns an error if the Kubernetes API request fails.
pub async fn load_sync_options(
    client: kube::Client,
    namespace: &str,
    configmap_name: &str,
) -> Result<ConfigOptions> {
    let configmaps: Api<ConfigMap> = Api::namespaced(client, namespace);
    let configmap = configmaps
        .get_opt(configmap_name)
        .await
        .with_context(|| format!("Failed to read ConfigMap {namespace}/{configmap_name}"))?;

    if let Some(configmap) = configmap {
        Ok(ConfigOptions::from_config_map(&configmap))
    } else {
        warn!(
            "ConfigMap '{}' not found in namespace '{}', using default sync options",
            configmap_name, namespace
        );
        Ok(ConfigOptions::default())
    }
}

/// Start watching the sync options ConfigMap and hot-reload on changes
pub fn start_configmap_watch(
    client: kube::Client,
    namespace: &str,
    configmap_name: &str,
    options: SharedSyncOptions,
    trigger: ReconcileTrigger,
) {
    let namespace = namespace.to_string();
    let configmap_name = configmap_name.to_string();
    tokio::spawn(async move {
        let configmaps: Api<ConfigMap> = Api::namespaced(client, &namespace);

        info!(
            "Starting watch for ConfigMap '{}' in namespace '{}'",
            configmap_name, namespace
        );

        let watcher_config =
            watcher::Config::default().fields(&format!("metadata.name={configmap_name}"));
        let stream = watcher(configmaps, watcher_config);
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(watcher::Event::Apply(configmap) | watcher::Event::InitApply(configmap)) => {
                    if configmap.metadata.name.as_deref() == Some(configmap_name.as_str()) {
                        apply_options(
                            ConfigOptions::from_config_map(&configmap),
                            &options,
                            &trigger,
                        )
                        .await;
                    }
                }
                Ok(watcher::Event::Delete(configmap)) => {
                    if configmap.metadata.name.as_deref() == Some(configmap_name.as_str()) {
                        warn!(
                            "ConfigMap '{}' was deleted, reverting to default sync options",
                            configmap_name
                        );
                        apply_options(ConfigOptions::default(), &options, &trigger).await;
                    }
                }
                Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
                Err(e) => {
                    // The watcher retries on its own
                    error!("Error watching ConfigMap: {}", e);
                }
            }
        }

        warn!("ConfigMap watch stream ended");
    });
}

/// Swap in new options if they differ from the current ones
async fn apply_options(
    new_options: ConfigOptions,
    options: &SharedSyncOptions,
    trigger: &ReconcileTrigger,
) -> bool {
    {
        let mut current = options.write().await;
        if *current == new_options {
            debug!("Sync options unchanged");
            return false;
        }
        *current = new_options.clone();
    }

    info!(
        sync.direction = new_options.sync_direction.as_str(),
        sync.conflict_policy = new_options.conflict_policy.as_str(),
        sync.label_prefix = new_options.label_prefix.as_str(),
        sync.tag_prefix = new_options.tag_prefix.as_str(),
        sync.resource_group_filter = new_options.resource_group_filter.as_str(),
        sync.interval_minutes = new_options.interval_minutes,
        "Sync options reloaded, reconciling all nodes"
    );
    trigger.fire();
    true
}
