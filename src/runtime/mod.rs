//! # Runtime
//!
//! - `initialization`: startup sequence
//! - `watch_loop`: node controller with automatic restart
//! - `error_policy`: reconciliation and watch stream error handling

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
