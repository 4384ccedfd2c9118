use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use esx_client::RepositoryClient;
use esx_schemas::SnapshotName;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::{
    derive_key, CycleError, CycleReport, FetchFailure, MetricKey, MetricSink, PublishedSeries,
    PublishedSet,
};

/// One unit of work on the shared queue.
struct WorkItem {
    name: SnapshotName,
    /// Key published for this name by an earlier cycle, if any.
    prior: Option<MetricKey>,
}

enum ItemOutcome {
    Published {
        series: PublishedSeries,
        replaced: Option<MetricKey>,
    },
    Failed(FetchFailure),
}

/// Discovers snapshots, retires stale series and republishes sizes.
///
/// Owns the [`PublishedSet`] carried between cycles. The set sits behind an
/// async mutex that a cycle holds for its whole duration; a cycle that finds
/// it taken is skipped with [`CycleError::AlreadyRunning`] instead of queueing.
pub struct ReconcileEngine {
    client: Arc<dyn RepositoryClient>,
    sink: Arc<dyn MetricSink>,
    threads: NonZeroUsize,
    published: Mutex<PublishedSet>,
}

impl ReconcileEngine {
    pub fn new(
        client: Arc<dyn RepositoryClient>,
        sink: Arc<dyn MetricSink>,
        threads: NonZeroUsize,
    ) -> Self {
        Self {
            client,
            sink,
            threads,
            published: Mutex::new(PublishedSet::new()),
        }
    }

    pub fn threads(&self) -> usize {
        self.threads.get()
    }

    pub fn repository(&self) -> &str {
        self.client.repository()
    }

    /// `true` while a cycle holds the published set.
    pub fn is_running(&self) -> bool {
        self.published.try_lock().is_err()
    }

    /// Copy of the cross-cycle state. Waits for a running cycle to finish.
    pub async fn published(&self) -> PublishedSet {
        self.published.lock().await.clone()
    }

    /// Run exactly one reconciliation cycle to completion.
    ///
    /// 1. List snapshots; on failure return [`CycleError::Discovery`] and leave
    ///    the sink untouched.
    /// 2. Delete the series of every name that left the listing.
    /// 3. Fetch every listed name on `threads` workers and publish successes.
    ///    Item failures are reported, never escalated.
    /// 4. Adopt the listing as the previous set, regardless of item failures.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let mut published = self
            .published
            .try_lock()
            .map_err(|_| CycleError::AlreadyRunning)?;
        let started = Instant::now();
        let repository = self.client.repository().to_string();

        let listed = self.client.list_snapshots().await.map_err(|e| {
            error!(
                repository = %repository,
                error = %e,
                "snapshot listing failed; keeping published series"
            );
            CycleError::Discovery(e)
        })?;
        let current: BTreeSet<SnapshotName> = listed.into_iter().collect();

        // Eviction completes before the first fetch is dispatched.
        let mut evicted = Vec::new();
        for name in published.stale(&current) {
            if let Some(key) = published.evict(&name) {
                self.sink.delete(&key);
                debug!(series = %key, "evicted stale series");
                evicted.push(key);
            }
        }

        let outcomes = self.fetch_and_publish(&current, &published).await;

        let mut report = CycleReport {
            repository,
            listed: current.len(),
            evicted,
            replaced: Vec::new(),
            published: Vec::with_capacity(outcomes.len()),
            failures: Vec::new(),
            series: 0,
            duration: started.elapsed(),
        };

        for outcome in outcomes {
            match outcome {
                ItemOutcome::Published { series, replaced } => {
                    published.record(series.key.clone());
                    if let Some(old) = replaced {
                        report.replaced.push(old);
                    }
                    report.published.push(series);
                }
                ItemOutcome::Failed(f) => report.failures.push(f),
            }
        }

        published.advance(current);
        report.series = published.series_count();
        report.duration = started.elapsed();
        report.sort();

        info!(
            repository = %report.repository,
            listed = report.listed,
            evicted = report.evicted.len(),
            published = report.published.len(),
            failed = report.failures.len(),
            elapsed_ms = report.duration.as_millis() as u64,
            "reconcile cycle complete"
        );
        Ok(report)
    }

    /// Enqueue every name, close the queue, and wait for all workers to drain it.
    ///
    /// Workers report each outcome as soon as it is known, before touching the
    /// sink. A worker that panics is replaced while the queue still has items.
    async fn fetch_and_publish(
        &self,
        names: &BTreeSet<SnapshotName>,
        published: &PublishedSet,
    ) -> Vec<ItemOutcome> {
        if names.is_empty() {
            return Vec::new();
        }

        let (tx, rx) = mpsc::channel::<WorkItem>(names.len());
        for name in names {
            let item = WorkItem {
                name: name.clone(),
                prior: published.key_for(name).cloned(),
            };
            // Capacity covers every name and `rx` is alive, so this never waits.
            if tx.send(item).await.is_err() {
                break;
            }
        }
        drop(tx);

        let queue = Arc::new(Mutex::new(rx));
        let (results_tx, mut results_rx) = mpsc::unbounded_channel::<ItemOutcome>();
        let workers = self.threads.get().min(names.len());
        let mut set = JoinSet::new();
        for worker in 0..workers {
            set.spawn(drain(
                worker,
                Arc::clone(&queue),
                Arc::clone(&self.client),
                Arc::clone(&self.sink),
                results_tx.clone(),
            ));
        }

        let mut next_worker = workers;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(()) => {}
                Err(e) if e.is_panic() => {
                    error!(
                        worker = next_worker,
                        error = %e,
                        "snapshot worker panicked; starting a replacement"
                    );
                    set.spawn(drain(
                        next_worker,
                        Arc::clone(&queue),
                        Arc::clone(&self.client),
                        Arc::clone(&self.sink),
                        results_tx.clone(),
                    ));
                    next_worker += 1;
                }
                Err(e) => error!(error = %e, "snapshot worker cancelled"),
            }
        }
        drop(results_tx);

        let mut outcomes = Vec::with_capacity(names.len());
        while let Some(outcome) = results_rx.recv().await {
            outcomes.push(outcome);
        }
        outcomes
    }
}

async fn drain(
    worker: usize,
    queue: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    client: Arc<dyn RepositoryClient>,
    sink: Arc<dyn MetricSink>,
    results: mpsc::UnboundedSender<ItemOutcome>,
) {
    loop {
        let next = queue.lock().await.recv().await;
        let Some(item) = next else {
            break;
        };
        fetch_one(worker, client.as_ref(), sink.as_ref(), item, &results).await;
    }
}

async fn fetch_one(
    worker: usize,
    client: &dyn RepositoryClient,
    sink: &dyn MetricSink,
    item: WorkItem,
    results: &mpsc::UnboundedSender<ItemOutcome>,
) {
    match client.get_snapshot_status(&item.name).await {
        Ok(record) => {
            let key = derive_key(&record);
            let value = record.total_size_bytes as f64;
            let replaced = item.prior.filter(|prior| *prior != key);

            // Tracked before the sink sees it, so a panic below cannot orphan the series.
            let _ = results.send(ItemOutcome::Published {
                series: PublishedSeries {
                    key: key.clone(),
                    value,
                },
                replaced: replaced.clone(),
            });

            if let Some(prior) = &replaced {
                sink.delete(prior);
                debug!(worker, from = %prior, to = %key, "snapshot changed state");
            }
            sink.set(&key, value);
        }
        Err(error) => {
            warn!(
                worker,
                snapshot = %item.name,
                error = %error,
                "snapshot status fetch failed; series left as-is"
            );
            let _ = results.send(ItemOutcome::Failed(FetchFailure {
                snapshot: item.name,
                error,
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esx_client::ClientError;
    use esx_schemas::{ClusterInfo, ClusterVersion, SnapshotRecord, SnapshotState};
    use std::collections::BTreeMap;
    use std::sync::Mutex as StdMutex;

    struct MapClient {
        snapshots: StdMutex<BTreeMap<String, (String, u64)>>,
    }

    impl MapClient {
        fn new(entries: &[(&str, &str, u64)]) -> Self {
            let map = entries
                .iter()
                .map(|(n, s, v)| (n.to_string(), (s.to_string(), *v)))
                .collect();
            Self {
                snapshots: StdMutex::new(map),
            }
        }
    }

    #[async_trait::async_trait]
    impl RepositoryClient for MapClient {
        fn repository(&self) -> &str {
            "backups"
        }

        async fn list_snapshots(&self) -> Result<Vec<SnapshotName>, ClientError> {
            Ok(self.snapshots.lock().unwrap().keys().cloned().collect())
        }

        async fn get_snapshot_status(&self, name: &str) -> Result<SnapshotRecord, ClientError> {
            let map = self.snapshots.lock().unwrap();
            let (state, size) = map.get(name).cloned().ok_or_else(|| ClientError::Api {
                status: 404,
                message: "missing".to_string(),
            })?;
            Ok(SnapshotRecord {
                name: name.to_string(),
                repository: "backups".to_string(),
                state: SnapshotState::new(state),
                total_size_bytes: size,
            })
        }

        async fn get_cluster_info(&self) -> Result<ClusterInfo, ClientError> {
            Ok(ClusterInfo {
                name: "n".to_string(),
                cluster_name: "c".to_string(),
                cluster_uuid: String::new(),
                version: ClusterVersion {
                    number: "7".to_string(),
                },
            })
        }
    }

    #[derive(Default)]
    struct MapSink {
        series: StdMutex<BTreeMap<MetricKey, f64>>,
    }

    impl MetricSink for MapSink {
        fn set(&self, key: &MetricKey, value: f64) {
            self.series.lock().unwrap().insert(key.clone(), value);
        }

        fn delete(&self, key: &MetricKey) -> bool {
            self.series.lock().unwrap().remove(key).is_some()
        }
    }

    fn engine(client: Arc<MapClient>, sink: Arc<MapSink>, threads: usize) -> ReconcileEngine {
        ReconcileEngine::new(client, sink, NonZeroUsize::new(threads).unwrap())
    }

    #[tokio::test]
    async fn first_cycle_publishes_every_snapshot() {
        let client = Arc::new(MapClient::new(&[
            ("daily-1", "SUCCESS", 10),
            ("nightly", "SUCCESS", 20),
        ]));
        let sink = Arc::new(MapSink::default());
        let eng = engine(client, Arc::clone(&sink), 2);

        let report = eng.run_cycle().await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.listed, 2);
        assert_eq!(report.published.len(), 2);
        assert_eq!(report.series, 2);
        let series = sink.series.lock().unwrap();
        let prefixes: Vec<&str> = series.keys().map(|k| k.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["daily", "nightly"]);
    }

    #[tokio::test]
    async fn state_change_replaces_series_for_same_snapshot() {
        let client = Arc::new(MapClient::new(&[("daily-1", "IN_PROGRESS", 5)]));
        let sink = Arc::new(MapSink::default());
        let eng = engine(Arc::clone(&client), Arc::clone(&sink), 1);
        eng.run_cycle().await.unwrap();

        client
            .snapshots
            .lock()
            .unwrap()
            .insert("daily-1".to_string(), ("SUCCESS".to_string(), 9));
        let report = eng.run_cycle().await.unwrap();

        assert_eq!(report.replaced.len(), 1);
        assert_eq!(report.replaced[0].state, "IN_PROGRESS");
        let series = sink.series.lock().unwrap();
        assert_eq!(series.len(), 1);
        let (key, value) = series.iter().next().unwrap();
        assert_eq!(key.state, "SUCCESS");
        assert_eq!(*value, 9.0);
    }

    #[tokio::test]
    async fn independent_engines_do_not_share_state() {
        let client = Arc::new(MapClient::new(&[("a-1", "SUCCESS", 1)]));
        let first = engine(Arc::clone(&client), Arc::new(MapSink::default()), 1);
        let second = engine(client, Arc::new(MapSink::default()), 1);

        first.run_cycle().await.unwrap();

        assert_eq!(first.published().await.series_count(), 1);
        assert_eq!(second.published().await.series_count(), 0);
    }
}
