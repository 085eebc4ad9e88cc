//! Tag/Label Sync Controller Library
//!
//! Keeps the tags of an Azure virtual machine or VM scale set and the labels of the
//! Kubernetes node running on it consistent, in either or both directions.
//!
//! ## Layout
//!
//! - [`sync`]: name/value transformation, conflict resolution and the convergence pass
//! - [`provider`]: the two stores the pass reads and writes (ARM tags, node labels)
//! - [`controller`]: node reconciler that picks the right tag store per node
//! - [`config`]: sync options (ConfigMap) and process settings (environment)
//! - [`runtime`]: startup, watch loop and error policy
//!
//! ## Quick Start
//!
//! ```rust
//! use tag_label_sync::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod sync;
