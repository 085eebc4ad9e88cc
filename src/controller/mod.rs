//! # Controller
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//! - `reconciler`: per-node reconciliation
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
