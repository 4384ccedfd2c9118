use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot identifier, unique within a repository at a point in time.
pub type SnapshotName = String;

/// Snapshot state exactly as reported by the cluster.
///
/// The vocabulary (`SUCCESS`, `IN_PROGRESS`, `PARTIAL`, `FAILED`, ...) belongs to
/// the cluster; it is carried through verbatim and never normalised.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotState(String);

impl SnapshotState {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotState {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-snapshot status as decoded at the client boundary.
///
/// Built fresh every cycle from live cluster state and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub name: SnapshotName,
    pub repository: String,
    pub state: SnapshotState,
    /// `stats.total.size_in_bytes` of the snapshot status response.
    pub total_size_bytes: u64,
}

/// Subset of the cluster root document (`GET /`) used by the startup check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Node that answered the request.
    pub name: String,
    pub cluster_name: String,
    #[serde(default)]
    pub cluster_uuid: String,
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVersion {
    pub number: String,
}
