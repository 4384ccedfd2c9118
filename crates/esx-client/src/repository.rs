//! Repository client boundary.
//!
//! This module defines **only** the error type and the client trait the
//! reconciliation engine talks to. The HTTP implementation lives in `lib.rs`;
//! fakes for tests live in `esx-testkit`.

use std::fmt;

use esx_schemas::{ClusterInfo, SnapshotName, SnapshotRecord};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a [`RepositoryClient`] implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Connection, TLS or timeout failure.
    Transport(String),
    /// The cluster answered with a non-success HTTP status.
    Api { status: u16, message: String },
    /// A response payload did not have the expected shape.
    Decode(String),
    /// The client could not be constructed (bad endpoint, unreadable CA file, ...).
    Config(String),
}

impl ClientError {
    /// Short, stable label for logs and counters.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientError::Transport(_) => "transport",
            ClientError::Api { .. } => "api",
            ClientError::Decode(_) => "decode",
            ClientError::Config(_) => "config",
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Transport(msg) => write!(f, "transport error: {msg}"),
            ClientError::Api { status, message } => {
                write!(f, "cluster api error status={status}: {message}")
            }
            ClientError::Decode(msg) => write!(f, "decode error: {msg}"),
            ClientError::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

// ---------------------------------------------------------------------------
// Client trait
// ---------------------------------------------------------------------------

/// Read-only view of one snapshot repository on a cluster.
///
/// Implementations must be object-safe and `Send + Sync`: the engine holds an
/// `Arc<dyn RepositoryClient>` and calls it from several worker tasks at once.
#[async_trait::async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Name of the repository this client reads.
    fn repository(&self) -> &str;

    /// Names of every snapshot currently in the repository.
    async fn list_snapshots(&self) -> Result<Vec<SnapshotName>, ClientError>;

    /// Status of a single snapshot, decoded and validated.
    async fn get_snapshot_status(&self, name: &str) -> Result<SnapshotRecord, ClientError>;

    /// Cluster identity; used once at startup as a connectivity probe.
    async fn get_cluster_info(&self) -> Result<ClusterInfo, ClientError>;
}
