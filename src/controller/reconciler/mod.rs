//! # Reconciler
//!
//! - `types`: reconciler context, errors and backoff state
//! - `reconcile`: per-node dispatch into the sync engine

pub mod reconcile;
pub mod types;

pub use reconcile::{reconcile, resolve_target};
pub use types::{BackoffState, Reconciler, ReconcilerError, SkipReason, TriggerSource};
