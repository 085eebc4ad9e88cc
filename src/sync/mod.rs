//! # Sync
//!
//! The convergence logic between ARM tags and node labels:
//!
//! - [`naming`]: tag name <-> label name mapping and value checks
//! - [`conflict`]: per-key decision for a direction and conflict policy
//! - [`engine`]: one pass over a tag store and a label store

pub mod conflict;
pub mod engine;
pub mod error;
pub mod naming;

pub use conflict::{decide, Decision, SyncPass};
pub use engine::{Diagnostic, DiagnosticSink, SyncEngine, SyncOutcome};
pub use error::SyncError;

use std::collections::BTreeMap;

/// Tags of an ARM resource
pub type TagMap = BTreeMap<String, String>;

/// Labels of a Kubernetes node
pub type LabelMap = BTreeMap<String, String>;
