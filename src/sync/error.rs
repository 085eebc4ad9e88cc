//! # Sync Errors

use thiserror::Error;

/// Errors that end a convergence pass.
///
/// Skipped keys and conflicts are not errors; they are reported as
/// [`Diagnostic`](crate::sync::Diagnostic)s.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The conflict policy was not one of the known values
    #[error("unrecognized conflict policy '{0}'")]
    Config(String),

    #[error("failed to read labels of node {node}")]
    FetchLabels {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read tags of {resource}")]
    FetchTags {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update labels of node {node}")]
    PersistLabels {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to update tags of {resource}")]
    PersistTags {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    /// Both half-passes failed to write
    #[error("failed to update labels ({labels}) and tags ({tags})")]
    PersistBoth {
        labels: Box<SyncError>,
        tags: Box<SyncError>,
    },
}

impl SyncError {
    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Config(_) => "config",
            SyncError::FetchLabels { .. } => "fetch-labels",
            SyncError::FetchTags { .. } => "fetch-tags",
            SyncError::PersistLabels { .. } => "persist-labels",
            SyncError::PersistTags { .. } => "persist-tags",
            SyncError::PersistBoth { .. } => "persist-both",
        }
    }
}
