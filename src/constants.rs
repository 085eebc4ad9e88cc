//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default exponential backoff starting value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch stream errors (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Fibonacci backoff bounds for failed node reconciliations (minutes)
pub const ERROR_BACKOFF_MIN_MINUTES: u64 = 1;
pub const ERROR_BACKOFF_MAX_MINUTES: u64 = 10;

/// Name of the ConfigMap holding the sync options
pub const DEFAULT_SYNC_CONFIGMAP_NAME: &str = "tag-label-sync";

/// Namespace the sync ConfigMap is read from when none is configured
pub const DEFAULT_SYNC_CONFIGMAP_NAMESPACE: &str = "default";

/// Controller name reported on Kubernetes Events
pub const CONTROLLER_NAME: &str = "tag-label-sync";

/// Annotation stamped by `tlsctl reconcile` to force a node reconciliation
pub const RECONCILE_ANNOTATION: &str = "tag-label-sync.io/reconcile";

/// Azure Resource Manager endpoint (public cloud)
pub const DEFAULT_ARM_ENDPOINT: &str = "https://management.azure.com";

/// OAuth scope for Azure Resource Manager tokens
pub const ARM_TOKEN_SCOPE: &str = "https://management.azure.com/.default";

/// Compute API version used for VM and VM scale set reads and tag updates
pub const COMPUTE_API_VERSION: &str = "2024-07-01";

/// How long startup waits for the HTTP server to bind (seconds)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the HTTP server to bind (milliseconds)
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;
