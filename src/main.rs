//! # Tag/Label Sync Controller
//!
//! Keeps Azure VM / VM scale set tags and Kubernetes node labels in sync.

use anyhow::Result;
use tag_label_sync::runtime::initialization::initialize;
use tag_label_sync::runtime::watch_loop::run_watch_loop;

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;

    run_watch_loop(
        init.nodes,
        init.reconciler,
        init.server_state,
        init.trigger,
        init.controller_config,
    )
    .await
}
