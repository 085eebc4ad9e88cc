//! # Kubernetes
//!
//! Node labels as a [`NodeLabels`] store, and diagnostics as Node Events.

use crate::provider::{NodeLabelSnapshot, NodeLabels};
use crate::sync::{Diagnostic, DiagnosticSink, LabelMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, ObjectReference};
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use kube_runtime::events::{Event, EventType, Recorder};
use serde_json::json;
use tracing::{debug, warn};

/// Merge patch that writes `labels` on top of the node's labels.
///
/// Carrying the resource version makes the API server reject the patch with a conflict
/// when the node changed after it was read.
fn labels_patch(labels: &LabelMap, resource_version: Option<&str>) -> serde_json::Value {
    let mut metadata = json!({ "labels": labels });
    if let Some(resource_version) = resource_version {
        metadata["resourceVersion"] = json!(resource_version);
    }
    json!({ "metadata": metadata })
}

/// Labels of cluster nodes
#[derive(Clone)]
pub struct KubeNodeLabels {
    nodes: Api<Node>,
}

impl std::fmt::Debug for KubeNodeLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeNodeLabels").finish_non_exhaustive()
    }
}

impl KubeNodeLabels {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            nodes: Api::all(client),
        }
    }
}

#[async_trait]
impl NodeLabels for KubeNodeLabels {
    async fn get_labels(&self, node_name: &str) -> Result<NodeLabelSnapshot> {
        let node = self
            .nodes
            .get(node_name)
            .await
            .with_context(|| format!("Failed to get node {node_name}"))?;
        Ok(NodeLabelSnapshot {
            labels: node.metadata.labels.unwrap_or_default(),
            resource_version: node.metadata.resource_version,
        })
    }

    async fn set_labels(
        &self,
        node_name: &str,
        read: &NodeLabelSnapshot,
        labels: &LabelMap,
    ) -> Result<()> {
        let patch = labels_patch(labels, read.resource_version.as_deref());
        self.nodes
            .patch(node_name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .with_context(|| format!("Failed to update labels of node {node_name}"))?;
        debug!(
            node.name = node_name,
            labels = labels.len(),
            resource_version = ?read.resource_version,
            "Updated node labels"
        );
        Ok(())
    }
}

/// Publishes diagnostics as Warning Events on one node
pub struct KubeEventSink {
    recorder: Recorder,
    node: ObjectReference,
}

impl std::fmt::Debug for KubeEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeEventSink")
            .field("node", &self.node.name)
            .finish_non_exhaustive()
    }
}

impl KubeEventSink {
    #[must_use]
    pub fn new(recorder: Recorder, node: ObjectReference) -> Self {
        Self { recorder, node }
    }
}

#[async_trait]
impl DiagnosticSink for KubeEventSink {
    async fn report(&self, node_name: &str, diagnostic: &Diagnostic) {
        if !diagnostic.publish_as_event() {
            return;
        }
        let event = Event {
            type_: EventType::Warning,
            reason: diagnostic.reason().to_string(),
            note: Some(diagnostic.message()),
            action: "Sync".to_string(),
            secondary: None,
        };
        // Event delivery is best effort
        if let Err(e) = self.recorder.publish(&event, &self.node).await {
            warn!(node.name = node_name, error = %e, "Failed to publish event");
        }
    }
}
