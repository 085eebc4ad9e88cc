//! # Watch Loop
//!
//! Watches cluster nodes and reconciles them, restarting the controller stream after
//! errors until a shutdown signal arrives.

use crate::config::{ControllerConfig, ReconcileTrigger};
use crate::controller::reconciler::{reconcile, Reconciler, TriggerSource};
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Node;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::{watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the node watch loop
///
/// Every node change, every periodic requeue and every sync options change (via
/// `trigger`) leads to a reconciliation.
///
/// # Errors
///
/// Currently never fails; the loop exits once shutdown was requested.
pub async fn run_watch_loop(
    nodes: Api<Node>,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
    trigger: ReconcileTrigger,
    config: ControllerConfig,
) -> Result<(), anyhow::Error> {
    info!("Starting controller watch loop...");

    let backoff_duration_ms = Arc::new(AtomicU64::new(config.backoff_start_ms));

    let shutdown_server_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_server_state.is_ready.store(false, Ordering::Relaxed);
        info!("Marked server as not ready, waiting for in-flight reconciliations to complete...");
    });

    loop {
        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let backoff_start_ms = config.backoff_start_ms;
        let backoff_max_ms = config.backoff_max_ms;
        let watch_restart_delay_secs = config.watch_restart_delay_secs;
        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");

        Controller::new(nodes.clone(), watcher::Config::default().any_semantic())
            .reconcile_all_on(trigger.subscribe())
            .shutdown_on_signal()
            .run(
                |node, ctx| {
                    let trigger_source = TriggerSource::from_node(&node);
                    debug!(
                        node.name = %node.name_any(),
                        trigger.source = trigger_source.as_str(),
                        "Reconciliation triggered"
                    );
                    reconcile(node, ctx)
                },
                handle_reconciliation_error,
                Arc::clone(&reconciler),
            )
            .filter_map(move |result| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match &result {
                        Ok(_) => {
                            backoff.store(backoff_start_ms, Ordering::Relaxed);
                            Some(result)
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                backoff_max_ms,
                                watch_restart_delay_secs,
                            )
                            .await
                            .map(|()| result)
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = config.watch_restart_delay_after_end_duration();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
