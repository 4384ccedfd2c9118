use std::fmt;
use std::time::Duration;

use esx_client::ClientError;
use esx_schemas::SnapshotName;

/// Label names of the snapshot size gauge, in exposition order.
pub const LABEL_NAMES: [&str; 4] = ["repository", "state", "snapshot", "prefix"];

/// Identity of one published series.
///
/// Keyed by the full label combination: the same snapshot in two different
/// states yields two different keys.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MetricKey {
    pub repository: String,
    pub state: String,
    pub snapshot: SnapshotName,
    pub prefix: String,
}

impl MetricKey {
    /// Label values in [`LABEL_NAMES`] order.
    pub fn label_values(&self) -> [&str; 4] {
        [
            self.repository.as_str(),
            self.state.as_str(),
            self.snapshot.as_str(),
            self.prefix.as_str(),
        ]
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{repository={}, state={}, snapshot={}, prefix={}}}",
            self.repository, self.state, self.snapshot, self.prefix
        )
    }
}

/// A series written during a cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct PublishedSeries {
    pub key: MetricKey,
    pub value: f64,
}

/// A status fetch that failed; the snapshot's series was left untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchFailure {
    pub snapshot: SnapshotName,
    pub error: ClientError,
}

/// Outcome of one completed cycle.
///
/// Vectors are sorted so two reports over the same cluster state compare equal.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub repository: String,
    /// Distinct names returned by the listing.
    pub listed: usize,
    /// Keys deleted because their snapshot left the listing.
    pub evicted: Vec<MetricKey>,
    /// Keys deleted because the same snapshot was published under a new state.
    pub replaced: Vec<MetricKey>,
    pub published: Vec<PublishedSeries>,
    pub failures: Vec<FetchFailure>,
    /// Series tracked as live in the sink once the cycle finished.
    pub series: usize,
    pub duration: Duration,
}

impl CycleReport {
    /// `true` when every dispatched fetch succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn sort(&mut self) {
        self.evicted.sort();
        self.replaced.sort();
        self.published.sort_by(|a, b| a.key.cmp(&b.key));
        self.failures.sort_by(|a, b| a.snapshot.cmp(&b.snapshot));
    }
}

/// Why a cycle produced no report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleError {
    /// Another cycle on the same engine is still executing; this one was skipped.
    AlreadyRunning,
    /// The snapshot listing failed; published series were left as they were.
    Discovery(ClientError),
}

impl CycleError {
    pub fn is_skip(&self) -> bool {
        matches!(self, CycleError::AlreadyRunning)
    }
}

impl fmt::Display for CycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleError::AlreadyRunning => {
                write!(f, "cycle skipped: previous cycle still running")
            }
            CycleError::Discovery(e) => write!(f, "snapshot discovery failed: {e}"),
        }
    }
}

impl std::error::Error for CycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CycleError::AlreadyRunning => None,
            CycleError::Discovery(e) => Some(e),
        }
    }
}
