//! # Initialization
//!
//! Controller startup: rustls, tracing, metrics, probe server, Kubernetes and ARM
//! clients, sync options and the reconciler context.

use crate::config::{
    create_shared_options, load_sync_options, start_configmap_watch, ControllerConfig,
    ReconcileTrigger, ServerConfig,
};
use crate::constants::CONTROLLER_NAME;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use crate::provider::azure::{ArmClient, AzureCredential};
use crate::provider::kubernetes::KubeNodeLabels;
use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::Node;
use kube::api::{Api, ListParams};
use kube::Client;
use kube_runtime::events::{Recorder, Reporter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// Everything the watch loop needs
pub struct InitializationResult {
    /// All cluster nodes
    pub nodes: Api<Node>,
    pub reconciler: Arc<Reconciler>,
    pub server_state: Arc<ServerState>,
    /// Fired by the ConfigMap watch when the sync options change
    pub trigger: ReconcileTrigger,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.is_ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Returns an error if the probe server does not come up, the Kubernetes client or the
/// Azure credential cannot be created, or nodes cannot be listed.
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_existing| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let controller_config = ControllerConfig::from_env();
    let server_config = ServerConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "tag_label_sync={}",
                    controller_config.log_level.to_lowercase()
                )
                .into()
            }),
        )
        .init();

    info!("Starting Tag/Label Sync Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let credential =
        AzureCredential::from_environment(controller_config.azure_client_id.as_deref())?;
    let arm = Arc::new(ArmClient::new(
        &controller_config.arm_endpoint,
        Arc::new(credential),
    )?);
    info!("Using Azure Resource Manager endpoint {}", arm.endpoint());

    let options = load_sync_options(
        client.clone(),
        &controller_config.sync_configmap_namespace,
        &controller_config.sync_configmap_name,
    )
    .await?;
    info!(
        sync.direction = %options.sync_direction,
        sync.conflict_policy = %options.conflict_policy,
        sync.label_prefix = %options.label_prefix,
        sync.tag_prefix = %options.tag_prefix,
        sync.max_tags = options.max_tags,
        sync.resource_group_filter = %options.resource_group_filter,
        sync.interval_minutes = options.interval_minutes,
        "Loaded sync options"
    );
    let options = create_shared_options(options);

    let trigger = ReconcileTrigger::new();
    start_configmap_watch(
        client.clone(),
        &controller_config.sync_configmap_namespace,
        &controller_config.sync_configmap_name,
        Arc::clone(&options),
        trigger.clone(),
    );

    let reporter = Reporter {
        controller: CONTROLLER_NAME.to_string(),
        instance: std::env::var("POD_NAME").ok(),
    };
    let recorder = Recorder::new(client.clone(), reporter);
    let labels = Arc::new(KubeNodeLabels::new(client.clone()));
    let reconciler = Arc::new(Reconciler::new(arm, labels, recorder, options));

    let nodes: Api<Node> = Api::all(client);
    check_nodes_queryable(&nodes).await?;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        nodes,
        reconciler,
        server_state,
        trigger,
        controller_config,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }
        if server_state.is_ready() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }
        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Fail fast with RBAC guidance when nodes cannot be listed
async fn check_nodes_queryable(nodes: &Api<Node>) -> Result<()> {
    let span = tracing::info_span!("controller.startup.check_nodes");
    let _guard = span.enter();

    match nodes.list_metadata(&ListParams::default()).await {
        Ok(list) => {
            info!("Nodes are queryable, found {} nodes", list.items.len());
            Ok(())
        }
        Err(e) => {
            error!("Failed to list nodes: {}", e);
            error!("The controller needs get, list, watch, update and patch on nodes, and create on events:");
            error!("  kubectl auth can-i list nodes --as=system:serviceaccount:<namespace>:tag-label-sync");
            error!("  kubectl auth can-i update nodes --as=system:serviceaccount:<namespace>:tag-label-sync");
            Err(e).context("Failed to list nodes")
        }
    }
}
