//! # Providers
//!
//! The two stores a sync pass reads and writes.
//!
//! - [`ComputeTags`]: tags of the ARM resource behind a node (`azure`)
//! - [`NodeLabels`]: labels of the Kubernetes node (`kubernetes`)

use crate::provider::azure::ResourceIdentity;
use crate::sync::{LabelMap, TagMap};
use anyhow::Result;
use async_trait::async_trait;

/// Tag store of a compute resource
#[async_trait]
pub trait ComputeTags: Send + Sync {
    /// Current tags. A resource that does not exist has none.
    async fn get_tags(&self, resource: &ResourceIdentity) -> Result<TagMap>;

    /// Replace the full tag set
    async fn set_tags(&self, resource: &ResourceIdentity, tags: &TagMap) -> Result<()>;
}

/// Labels of a node and the object version they were read at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeLabelSnapshot {
    pub labels: LabelMap,
    /// `None` makes the next write unconditional
    pub resource_version: Option<String>,
}

/// Label store of a node
#[async_trait]
pub trait NodeLabels: Send + Sync {
    async fn get_labels(&self, node_name: &str) -> Result<NodeLabelSnapshot>;

    /// Write the full label map in a single object update.
    ///
    /// The write only succeeds while the node is still at `read.resource_version`;
    /// a node changed since the read is rejected with a conflict.
    async fn set_labels(
        &self,
        node_name: &str,
        read: &NodeLabelSnapshot,
        labels: &LabelMap,
    ) -> Result<()>;
}

pub mod azure;
pub mod kubernetes;
