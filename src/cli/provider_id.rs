//! # Provider ID Command
//!
//! Shows how a node's provider ID resolves to an ARM resource.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::Client;
use tag_label_sync::config::load_sync_options;
use tag_label_sync::constants::{DEFAULT_SYNC_CONFIGMAP_NAME, DEFAULT_SYNC_CONFIGMAP_NAMESPACE};
use tag_label_sync::controller::reconciler::resolve_target;
use tag_label_sync::provider::azure::ResourceIdentity;

pub fn parse_command(provider_id: &str) -> Result<()> {
    let identity = ResourceIdentity::from_provider_id(provider_id)
        .with_context(|| format!("Cannot parse provider ID '{provider_id}'"))?;
    print_identity(&identity);
    Ok(())
}

/// Resolve a node the way the controller does, including the resource group filter
pub async fn node_command(client: Client, name: String, namespace: Option<String>) -> Result<()> {
    let nodes: Api<Node> = Api::all(client.clone());
    let node = nodes
        .get(&name)
        .await
        .with_context(|| format!("Failed to get node '{name}'"))?;

    let ns = namespace.as_deref().unwrap_or(DEFAULT_SYNC_CONFIGMAP_NAMESPACE);
    let options = load_sync_options(client, ns, DEFAULT_SYNC_CONFIGMAP_NAME).await?;

    match resolve_target(&node, &options) {
        Ok(identity) => {
            print_identity(&identity);
            Ok(())
        }
        Err(reason) => {
            println!("⚠️  Node '{name}' is not synced: {reason}");
            Ok(())
        }
    }
}

fn print_identity(identity: &ResourceIdentity) {
    println!("Subscription:   {}", identity.subscription_id);
    println!("Resource group: {}", identity.resource_group);
    println!("Kind:           {}", identity.kind);
    println!("Name:           {}", identity.name);
    println!("ARM ID:         {}", identity.arm_id());
}
