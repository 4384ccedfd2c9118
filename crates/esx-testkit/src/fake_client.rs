//! In-process repository client for engine scenarios.
//!
//! Deterministic, no network I/O. Every status call is counted and the number
//! of calls executing at the same time is tracked so tests can assert the
//! worker-pool bound.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use esx_client::{ClientError, RepositoryClient};
use esx_schemas::{ClusterInfo, ClusterVersion, SnapshotName, SnapshotRecord, SnapshotState};
use tokio::sync::Semaphore;

#[derive(Default)]
struct FakeCluster {
    snapshots: BTreeMap<SnapshotName, (SnapshotState, u64)>,
    failing: BTreeSet<SnapshotName>,
    list_error: Option<ClientError>,
    unreachable: bool,
    fetch_delay: Duration,
    status_requests: Vec<SnapshotName>,
}

/// Decrements the in-flight counter when the call finishes, however it ends.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct FakeRepositoryClient {
    repository: String,
    cluster: Mutex<FakeCluster>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    list_calls: AtomicUsize,
    listing_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeRepositoryClient {
    pub fn new(repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            cluster: Mutex::new(FakeCluster::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            listing_gate: Mutex::new(None),
        }
    }

    fn cluster(&self) -> MutexGuard<'_, FakeCluster> {
        // A poisoned lock only means another test thread panicked mid-update.
        self.cluster
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Builder form of [`put_snapshot`](Self::put_snapshot).
    pub fn with_snapshot(self, name: &str, state: &str, size: u64) -> Self {
        self.put_snapshot(name, state, size);
        self
    }

    /// Create or replace a snapshot.
    pub fn put_snapshot(&self, name: &str, state: &str, size: u64) {
        self.cluster()
            .snapshots
            .insert(name.to_string(), (SnapshotState::new(state), size));
    }

    pub fn remove_snapshot(&self, name: &str) {
        self.cluster().snapshots.remove(name);
    }

    /// Make status fetches for `name` fail with a 503 until [`heal`](Self::heal).
    pub fn fail_status_for(&self, name: &str) {
        self.cluster().failing.insert(name.to_string());
    }

    pub fn heal(&self, name: &str) {
        self.cluster().failing.remove(name);
    }

    /// Make the listing fail with `err` until [`restore_listing`](Self::restore_listing).
    pub fn fail_listing(&self, err: ClientError) {
        self.cluster().list_error = Some(err);
    }

    pub fn restore_listing(&self) {
        self.cluster().list_error = None;
    }

    /// Make `get_cluster_info` fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.cluster().unreachable = unreachable;
    }

    /// Delay applied inside every status call, while it counts as in flight.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.cluster().fetch_delay = delay;
    }

    /// Park every listing call until [`release_listing`](Self::release_listing).
    pub fn block_listing(&self) {
        *self
            .listing_gate
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_listing(&self) {
        let gate = self
            .listing_gate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .take();
        if let Some(gate) = gate {
            gate.close();
        }
    }

    /// Highest number of status calls observed executing at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Names passed to `get_snapshot_status`, in call order.
    pub fn status_requests(&self) -> Vec<SnapshotName> {
        self.cluster().status_requests.clone()
    }

    pub fn clear_status_requests(&self) {
        self.cluster().status_requests.clear();
    }
}

#[async_trait::async_trait]
impl RepositoryClient for FakeRepositoryClient {
    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotName>, ClientError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let gate = self
            .listing_gate
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(gate) = gate {
            // Closed on release; the error is the wake-up signal.
            let _ = gate.acquire().await;
        }

        let cluster = self.cluster();
        if let Some(err) = &cluster.list_error {
            return Err(err.clone());
        }
        Ok(cluster.snapshots.keys().cloned().collect())
    }

    async fn get_snapshot_status(&self, name: &str) -> Result<SnapshotRecord, ClientError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _in_flight = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = {
            let mut cluster = self.cluster();
            cluster.status_requests.push(name.to_string());
            cluster.fetch_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let cluster = self.cluster();
        if cluster.failing.contains(name) {
            return Err(ClientError::Api {
                status: 503,
                message: format!("injected failure for {name}"),
            });
        }
        let (state, size) = cluster.snapshots.get(name).cloned().ok_or_else(|| {
            ClientError::Api {
                status: 404,
                message: format!("snapshot_missing_exception: [{}:{name}]", self.repository),
            }
        })?;

        Ok(SnapshotRecord {
            name: name.to_string(),
            repository: self.repository.clone(),
            state,
            total_size_bytes: size,
        })
    }

    async fn get_cluster_info(&self) -> Result<ClusterInfo, ClientError> {
        if self.cluster().unreachable {
            return Err(ClientError::Transport(
                "connection refused (fake)".to_string(),
            ));
        }
        Ok(ClusterInfo {
            name: "fake-node".to_string(),
            cluster_name: "fake-cluster".to_string(),
            cluster_uuid: "fake-uuid".to_string(),
            version: ClusterVersion {
                number: "7.17.0".to_string(),
            },
        })
    }
}
