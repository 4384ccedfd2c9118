use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use esx_reconcile::{MetricKey, MetricSink};

/// One mutation applied to a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq)]
pub enum SinkOp {
    Set(MetricKey, f64),
    Delete(MetricKey),
}

impl SinkOp {
    pub fn key(&self) -> &MetricKey {
        match self {
            SinkOp::Set(k, _) | SinkOp::Delete(k) => k,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, SinkOp::Delete(_))
    }
}

#[derive(Default)]
struct Recorded {
    series: BTreeMap<MetricKey, f64>,
    ops: Vec<SinkOp>,
}

/// Gauge stand-in that keeps the live series and every mutation in order.
#[derive(Default)]
pub struct RecordingSink {
    inner: Mutex<Recorded>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Live series, ordered by key.
    pub fn series(&self) -> BTreeMap<MetricKey, f64> {
        self.inner().series.clone()
    }

    pub fn len(&self) -> usize {
        self.inner().series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().series.is_empty()
    }

    /// Snapshot names with at least one live series, sorted.
    pub fn snapshots(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner()
            .series
            .keys()
            .map(|k| k.snapshot.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Every live series for `snapshot` as (state, value).
    pub fn values_for(&self, snapshot: &str) -> Vec<(String, f64)> {
        self.inner()
            .series
            .iter()
            .filter(|(k, _)| k.snapshot == snapshot)
            .map(|(k, v)| (k.state.clone(), *v))
            .collect()
    }

    pub fn ops(&self) -> Vec<SinkOp> {
        self.inner().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.inner().ops.clear();
    }
}

impl MetricSink for RecordingSink {
    fn set(&self, key: &MetricKey, value: f64) {
        let mut inner = self.inner();
        inner.series.insert(key.clone(), value);
        inner.ops.push(SinkOp::Set(key.clone(), value));
    }

    fn delete(&self, key: &MetricKey) -> bool {
        let mut inner = self.inner();
        inner.ops.push(SinkOp::Delete(key.clone()));
        inner.series.remove(key).is_some()
    }
}
