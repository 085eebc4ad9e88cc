//! # Config Command
//!
//! Prints the sync options the controller would use.

use anyhow::Result;
use kube::Client;
use tag_label_sync::config::load_sync_options;
use tag_label_sync::constants::DEFAULT_SYNC_CONFIGMAP_NAMESPACE;

pub async fn config_command(
    client: Client,
    namespace: Option<String>,
    configmap: String,
) -> Result<()> {
    let ns = namespace.as_deref().unwrap_or(DEFAULT_SYNC_CONFIGMAP_NAMESPACE);
    let options = load_sync_options(client, ns, &configmap).await?;

    println!("Sync options from ConfigMap '{ns}/{configmap}':");
    println!("  syncDirection:       {}", options.sync_direction);
    println!("  conflictPolicy:      {}", options.conflict_policy);
    println!("  labelPrefix:         {}", options.label_prefix);
    println!("  tagPrefix:           {}", options.tag_prefix);
    println!("  maxTags:             {}", options.max_tags);
    println!("  resourceGroupFilter: {}", options.resource_group_filter);
    println!("  intervalMinutes:     {}", options.interval_minutes);

    Ok(())
}
