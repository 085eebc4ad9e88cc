//! # Controller Configuration
//!
//! Process-level settings loaded from environment variables.

use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables set on
/// the deployment.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Exponential backoff starting value for watch stream errors (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value for watch stream errors (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after the stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Name of the ConfigMap holding the sync options
    pub sync_configmap_name: String,
    /// Namespace of the sync options ConfigMap
    pub sync_configmap_namespace: String,
    /// Azure Resource Manager base URL
    pub arm_endpoint: String,
    /// Client ID of the user-assigned identity (Workload Identity / Managed Identity)
    pub azure_client_id: Option<String>,
    /// Global log level, used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            backoff_start_ms: DEFAULT_BACKOFF_START_MS,
            backoff_max_ms: DEFAULT_BACKOFF_MAX_MS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            watch_restart_delay_after_end_secs: DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            sync_configmap_name: DEFAULT_SYNC_CONFIGMAP_NAME.to_string(),
            sync_configmap_namespace: DEFAULT_SYNC_CONFIGMAP_NAMESPACE.to_string(),
            arm_endpoint: DEFAULT_ARM_ENDPOINT.to_string(),
            azure_client_id: None,
            log_level: "INFO".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            backoff_start_ms: env_var_or_default("BACKOFF_START_MS", DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: env_var_or_default("BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_AFTER_END_SECS",
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            sync_configmap_name: env_var_or_default_str(
                "SYNC_CONFIGMAP_NAME",
                DEFAULT_SYNC_CONFIGMAP_NAME,
            ),
            // The sync ConfigMap lives in `default` unless told otherwise, independent of
            // where the controller pod runs.
            sync_configmap_namespace: env_var_or_default_str(
                "SYNC_CONFIGMAP_NAMESPACE",
                DEFAULT_SYNC_CONFIGMAP_NAMESPACE,
            ),
            arm_endpoint: env_var_or_default_str("ARM_ENDPOINT", DEFAULT_ARM_ENDPOINT),
            azure_client_id: std::env::var("AZURE_CLIENT_ID")
                .ok()
                .filter(|id| !id.is_empty()),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
        }
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }
}

/// HTTP server configuration for metrics and probes
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub metrics_port: u16,
    pub startup_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
        }
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
