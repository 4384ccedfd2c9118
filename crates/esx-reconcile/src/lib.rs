//! esx-reconcile
//!
//! Reconciliation engine for snapshot size series.
//!
//! One cycle:
//! - discovers the snapshots currently in the repository
//! - retires series whose snapshot disappeared (before any new fetch)
//! - fetches per-snapshot status on a bounded worker pool
//! - publishes sizes into a [`MetricSink`], last write wins
//!
//! Item failures stay item failures; listing failures abort only the cycle.
//! The engine does not know about Prometheus, HTTP or schedules.

mod engine;
mod labels;
mod published;
mod sink;
mod types;

pub use engine::ReconcileEngine;
pub use labels::{derive_key, snapshot_prefix};
pub use published::PublishedSet;
pub use sink::MetricSink;
pub use types::*;
