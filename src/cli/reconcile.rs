//! # Reconcile Command
//!
//! Triggers reconciliation of a node by stamping an annotation on it.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use serde_json::json;
use tag_label_sync::constants::RECONCILE_ANNOTATION;

/// Any metadata change on a node wakes the controller's watch
pub async fn reconcile_command(client: Client, name: String) -> Result<()> {
    let api: Api<Node> = Api::all(client);

    println!("🔄 Triggering reconciliation for node '{name}'...");

    api.get(&name)
        .await
        .with_context(|| format!("Failed to get node '{name}'"))?;

    let timestamp = chrono::Utc::now().timestamp();

    let patch = json!({
        "metadata": {
            "annotations": {
                RECONCILE_ANNOTATION: timestamp.to_string()
            }
        }
    });

    api.patch(&name, &PatchParams::default(), &Patch::Merge(patch))
        .await
        .with_context(|| format!("Failed to trigger reconciliation for node '{name}'"))?;

    println!("✅ Reconciliation triggered successfully");
    println!("   Node: {name}");
    println!("   Annotation: {RECONCILE_ANNOTATION}={timestamp}");
    println!("\nThe controller will reconcile this node shortly.");

    Ok(())
}
