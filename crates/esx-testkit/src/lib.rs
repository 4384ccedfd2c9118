//! Test doubles for reconciliation scenarios.
//!
//! [`FakeRepositoryClient`] stands in for a cluster and [`RecordingSink`]
//! stands in for the Prometheus gauge. Both are deterministic and cheap to
//! build per test.

use std::num::NonZeroUsize;
use std::sync::Arc;

use esx_reconcile::ReconcileEngine;

mod fake_client;
mod recording_sink;

pub use fake_client::FakeRepositoryClient;
pub use recording_sink::{RecordingSink, SinkOp};

/// Engine wired to the given fake and recorder.
///
/// `threads == 0` is clamped to one worker.
pub fn engine_with(
    client: &Arc<FakeRepositoryClient>,
    sink: &Arc<RecordingSink>,
    threads: usize,
) -> ReconcileEngine {
    let threads = NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN);
    ReconcileEngine::new(client.clone(), sink.clone(), threads)
}
