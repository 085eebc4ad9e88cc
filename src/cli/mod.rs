//! # TLSCTL CLI
//!
//! Command-line companion for the Tag/Label Sync Controller.
//!
//! ## Usage
//!
//! ```bash
//! # Trigger reconciliation of one node
//! tlsctl reconcile aks-nodepool1-12345678-vmss000000
//!
//! # Show the effective sync options
//! tlsctl config
//!
//! # Show which ARM resource a provider ID maps to
//! tlsctl parse-provider-id azure:///subscriptions/.../virtualMachines/vm-0
//!
//! # Same, reading the provider ID from a node
//! tlsctl parse-provider-id --node aks-nodepool1-12345678-vmss000000
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kube::Client;

mod config;
mod provider_id;
mod reconcile;

/// Tag/Label Sync Controller CLI
#[derive(Parser)]
#[command(name = "tlsctl")]
#[command(
    about = "Tag/Label Sync Controller CLI",
    long_about = None,
    after_help = "\
Examples:
  tlsctl reconcile aks-nodepool1-12345678-vmss000000
  tlsctl config --namespace kube-system
  tlsctl parse-provider-id --node aks-nodepool1-12345678-vmss000000
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Namespace of the sync options ConfigMap
    #[arg(short, long, global = true)]
    namespace: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger reconciliation of a node
    Reconcile {
        /// Name of the node
        #[arg(value_name = "NODE")]
        name: String,
    },
    /// Show the effective sync options
    Config {
        /// Name of the sync options ConfigMap
        #[arg(long, default_value = tag_label_sync::constants::DEFAULT_SYNC_CONFIGMAP_NAME)]
        configmap: String,
    },
    /// Resolve a provider ID to the ARM resource it names
    #[command(name = "parse-provider-id")]
    ParseProviderId {
        /// Provider ID, e.g. azure:///subscriptions/<sub>/resourceGroups/<rg>/providers/Microsoft.Compute/virtualMachines/<name>
        #[arg(value_name = "PROVIDER_ID", required_unless_present = "node")]
        provider_id: Option<String>,

        /// Read the provider ID from this node instead
        #[arg(long, conflicts_with = "provider_id")]
        node: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tlsctl=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // Parsing a literal provider ID needs no cluster
    if let Commands::ParseProviderId {
        provider_id: Some(provider_id),
        ..
    } = &cli.command
    {
        return provider_id::parse_command(provider_id);
    }

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    match cli.command {
        Commands::Reconcile { name } => reconcile::reconcile_command(client, name).await,
        Commands::Config { configmap } => {
            config::config_command(client, cli.namespace, configmap).await
        }
        Commands::ParseProviderId { node, .. } => {
            let node = node.ok_or_else(|| anyhow::anyhow!("Either PROVIDER_ID or --node is required"))?;
            provider_id::node_command(client, node, cli.namespace).await
        }
    }
}
