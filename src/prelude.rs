//! # Prelude
//!
//! ```rust
//! use tag_label_sync::prelude::*;
//! ```

pub use crate::config::{
    ConfigOptions, ConflictPolicy, ControllerConfig, ServerConfig, SharedSyncOptions,
    SyncDirection,
};

pub use crate::controller::reconciler::{
    reconcile, resolve_target, Reconciler, ReconcilerError, SkipReason, TriggerSource,
};

pub use crate::provider::azure::{ArmClient, ResourceIdentity, ResourceKind};

pub use crate::provider::{ComputeTags, NodeLabelSnapshot, NodeLabels};

pub use crate::sync::{
    Diagnostic, DiagnosticSink, LabelMap, SyncEngine, SyncError, SyncOutcome, TagMap,
};
