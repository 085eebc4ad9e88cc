//! # Configuration
//!
//! Two layers of configuration:
//!
//! - [`ControllerConfig`] / [`ServerConfig`]: process settings from the environment,
//!   read once at startup
//! - [`ConfigOptions`]: sync options from the `tag-label-sync` ConfigMap, hot-reloaded
//!   by [`start_configmap_watch`]

pub mod controller;
pub mod options;
pub mod watch;

pub use controller::{ControllerConfig, ServerConfig};
pub use options::{ConfigOptions, ConflictPolicy, SyncDirection};
pub use watch::{load_sync_options, start_configmap_watch, ReconcileTrigger};

use std::sync::Arc;
use tokio::sync::RwLock;

/// Sync options shared between the ConfigMap watcher and the reconciler
pub type SharedSyncOptions = Arc<RwLock<ConfigOptions>>;

#[must_use]
pub fn create_shared_options(options: ConfigOptions) -> SharedSyncOptions {
    Arc::new(RwLock::new(options))
}
