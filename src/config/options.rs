//! # Sync Options
//!
//! The options that drive a convergence pass, read from the `tag-label-sync`
//! ConfigMap. Every field is always populated: missing or unrecognized values fall
//! back to the documented defaults here, before the sync engine ever sees them.

use k8s_openapi::api::core::v1::ConfigMap;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_LABEL_PREFIX: &str = "azure.tags";
pub const DEFAULT_TAG_PREFIX: &str = "node.labels";
pub const DEFAULT_RESOURCE_GROUP_FILTER: &str = "none";
/// Azure allows at most 50 tags per resource
pub const DEFAULT_MAX_TAGS: usize = 50;
pub const DEFAULT_INTERVAL_MINUTES: u64 = 1;

/// Which half of the convergence pass runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncDirection {
    /// Tags to labels and labels to tags
    TwoWay,
    /// Tags to labels only
    #[default]
    ArmToNode,
    /// Labels to tags only
    NodeToArm,
}

impl SyncDirection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDirection::TwoWay => "two-way",
            SyncDirection::ArmToNode => "arm-to-node",
            SyncDirection::NodeToArm => "node-to-arm",
        }
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two-way" => Ok(SyncDirection::TwoWay),
            "arm-to-node" => Ok(SyncDirection::ArmToNode),
            "node-to-arm" => Ok(SyncDirection::NodeToArm),
            other => Err(format!("unrecognized sync direction '{other}'")),
        }
    }
}

/// Tie-break applied when a key exists on both sides with different values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Never overwrite, report the disagreement
    Ignore,
    /// The tag value wins
    #[default]
    ArmPrecedence,
    /// The label value wins
    NodePrecedence,
    /// A value the loader did not recognize. Rejected by the conflict resolver.
    Unrecognized(String),
}

impl ConflictPolicy {
    /// Parse a policy name. Unknown names are carried as [`ConflictPolicy::Unrecognized`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "ignore" => ConflictPolicy::Ignore,
            "arm-precedence" => ConflictPolicy::ArmPrecedence,
            "node-precedence" => ConflictPolicy::NodePrecedence,
            other => ConflictPolicy::Unrecognized(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            ConflictPolicy::Ignore => "ignore",
            ConflictPolicy::ArmPrecedence => "arm-precedence",
            ConflictPolicy::NodePrecedence => "node-precedence",
            ConflictPolicy::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for one convergence pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOptions {
    pub sync_direction: SyncDirection,
    pub conflict_policy: ConflictPolicy,
    /// Prepended (with `/`) to every label created from a tag
    pub label_prefix: String,
    /// Stripped from tag names before they become label names
    pub tag_prefix: String,
    /// Labels are not copied to a resource that already carries this many tags
    pub max_tags: usize,
    /// Only resources in this resource group are synced; `none` disables the filter
    pub resource_group_filter: String,
    /// Periodic resync interval in minutes
    pub interval_minutes: u64,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            sync_direction: SyncDirection::default(),
            conflict_policy: ConflictPolicy::default(),
            label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
            tag_prefix: DEFAULT_TAG_PREFIX.to_string(),
            max_tags: DEFAULT_MAX_TAGS,
            resource_group_filter: DEFAULT_RESOURCE_GROUP_FILTER.to_string(),
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
        }
    }
}

/// ConfigMap data as written by operators, before defaults are applied
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfigOptions {
    sync_direction: Option<String>,
    conflict_policy: Option<String>,
    label_prefix: Option<String>,
    tag_prefix: Option<String>,
    max_tags: Option<String>,
    resource_group_filter: Option<String>,
    interval: Option<String>,
}

impl ConfigOptions {
    /// Build options from a ConfigMap. A ConfigMap without data yields the defaults.
    #[must_use]
    pub fn from_config_map(config_map: &ConfigMap) -> Self {
        config_map
            .data
            .as_ref()
            .map_or_else(Self::default, Self::from_data)
    }

    /// Build options from raw ConfigMap data, applying defaults field by field.
    ///
    /// Prefixes distinguish "missing" from "empty": an explicitly empty prefix is kept,
    /// which disables prefixing in that direction.
    #[must_use]
    pub fn from_data(data: &BTreeMap<String, String>) -> Self {
        let raw: RawConfigOptions = serde_json::to_value(data)
            .and_then(serde_json::from_value)
            .unwrap_or_default();
        let defaults = Self::default();

        let sync_direction = match raw.sync_direction.as_deref() {
            None => defaults.sync_direction,
            Some(value) => value.parse().unwrap_or_else(|e| {
                warn!(error = %e, "falling back to sync direction {}", defaults.sync_direction);
                defaults.sync_direction
            }),
        };

        let conflict_policy = match raw.conflict_policy.as_deref().map(ConflictPolicy::parse) {
            None => defaults.conflict_policy.clone(),
            Some(ConflictPolicy::Unrecognized(value)) => {
                warn!(
                    "unrecognized conflict policy '{}', falling back to {}",
                    value, defaults.conflict_policy
                );
                defaults.conflict_policy.clone()
            }
            Some(policy) => policy,
        };

        let max_tags = match raw.max_tags.as_deref() {
            None => defaults.max_tags,
            Some(value) => value.trim().parse().unwrap_or_else(|_| {
                warn!("invalid maxTags '{}', using {}", value, defaults.max_tags);
                defaults.max_tags
            }),
        };

        let interval_minutes = match raw.interval.as_deref() {
            None => defaults.interval_minutes,
            Some(value) => match value.trim().parse::<u64>() {
                Ok(minutes) if minutes > 0 => minutes,
                _ => {
                    warn!(
                        "invalid interval '{}', using {} minute(s)",
                        value, defaults.interval_minutes
                    );
                    defaults.interval_minutes
                }
            },
        };

        let resource_group_filter = raw
            .resource_group_filter
            .filter(|rg| !rg.trim().is_empty())
            .unwrap_or(defaults.resource_group_filter);

        Self {
            sync_direction,
            conflict_policy,
            label_prefix: raw.label_prefix.unwrap_or(defaults.label_prefix),
            tag_prefix: raw.tag_prefix.unwrap_or(defaults.tag_prefix),
            max_tags,
            resource_group_filter,
            interval_minutes,
        }
    }

    /// Whether a resource in `resource_group` is in scope for syncing.
    ///
    /// Azure resource group names are case-insensitive.
    #[must_use]
    pub fn matches_resource_group(&self, resource_group: &str) -> bool {
        self.resource_group_filter == DEFAULT_RESOURCE_GROUP_FILTER
            || self.resource_group_filter.eq_ignore_ascii_case(resource_group)
    }

    #[must_use]
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}
