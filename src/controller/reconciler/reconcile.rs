//! # Reconcile
//!
//! Entry point called by the controller for each node. Resolves the ARM resource
//! behind the node, picks its tag store and runs one sync pass.

use crate::config::ConfigOptions;
use crate::controller::reconciler::types::{Reconciler, ReconcilerError, SkipReason, TriggerSource};
use crate::observability::metrics;
use crate::provider::azure::{compute_tags_for, ResourceIdentity};
use crate::provider::kubernetes::KubeEventSink;
use crate::sync::SyncEngine;
use k8s_openapi::api::core::v1::Node;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};

/// The ARM resource to sync a node with, if the node is in scope
///
/// # Errors
///
/// Returns the [`SkipReason`] for nodes that are not synced.
pub fn resolve_target(
    node: &Node,
    options: &ConfigOptions,
) -> Result<ResourceIdentity, SkipReason> {
    let provider_id = node
        .spec
        .as_ref()
        .and_then(|spec| spec.provider_id.as_deref())
        .filter(|id| !id.is_empty())
        .ok_or(SkipReason::NoProviderId)?;

    let resource = ResourceIdentity::from_provider_id(provider_id)?;
    if !options.matches_resource_group(&resource.resource_group) {
        return Err(SkipReason::ResourceGroupFiltered {
            resource_group: resource.resource_group,
            filter: options.resource_group_filter.clone(),
        });
    }
    Ok(resource)
}

/// Reconcile one node
///
/// # Errors
///
/// Returns an error when the sync pass fails; the error policy schedules the retry.
pub async fn reconcile(node: Arc<Node>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = node.name_any();
    let trigger = TriggerSource::from_node(&node);
    let span = info_span!(
        "controller.node.reconcile",
        node.name = %name,
        trigger_source = trigger.as_str()
    );

    async move {
        // Snapshot so a reload mid-pass cannot mix two configurations
        let options = ctx.options.read().await.clone();

        let resource = match resolve_target(&node, &options) {
            Ok(resource) => resource,
            Err(reason) => {
                debug!(reason = %reason, "Skipping node");
                return Ok(Action::await_change());
            }
        };

        metrics::increment_reconciliations();
        let start = Instant::now();

        let tags = compute_tags_for(resource.kind, &ctx.arm);
        let events = KubeEventSink::new(ctx.recorder.clone(), node.object_ref(&()));
        let engine = SyncEngine::new(tags.as_ref(), ctx.labels.as_ref(), &events);
        let result = engine.reconcile(&name, &resource, &options).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.reset_backoff(&name);

        if outcome.is_noop() {
            debug!(resource = %resource, "Node already in sync");
        } else {
            info!(
                resource = %resource,
                labels_applied = outcome.labels_applied,
                tags_applied = outcome.tags_applied,
                "Node synced"
            );
        }

        metrics::increment_requeues_total("periodic");
        Ok(Action::requeue(options.resync_interval()))
    }
    .instrument(span)
    .await
}
