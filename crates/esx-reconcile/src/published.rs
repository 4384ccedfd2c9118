//! Cross-cycle record of what the engine has put into the sink.
//!
//! # Invariants
//!
//! - **One key per name**: at most one [`MetricKey`] is tracked per snapshot.
//! - **Names follow the listing**: after [`PublishedSet::advance`] the tracked
//!   names are exactly the last successful listing, whether or not each
//!   name's fetch succeeded.
//! - **Keys only for listed names**: every tracked key belongs to a name in the
//!   last listing once stale names have been evicted.
//! - **In-memory only**: reset on restart, never persisted.

use std::collections::{BTreeMap, BTreeSet};

use esx_schemas::SnapshotName;

use crate::MetricKey;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PublishedSet {
    names: BTreeSet<SnapshotName>,
    keys: BTreeMap<SnapshotName, MetricKey>,
}

impl PublishedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names discovered by the last successful listing.
    pub fn names(&self) -> &BTreeSet<SnapshotName> {
        &self.names
    }

    /// Key currently published for `name`, if its fetch ever succeeded.
    pub fn key_for(&self, name: &str) -> Option<&MetricKey> {
        self.keys.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &MetricKey> {
        self.keys.values()
    }

    pub fn series_count(&self) -> usize {
        self.keys.len()
    }

    /// `previous - current`, in name order.
    ///
    /// Names with a tracked key are included even if an earlier cycle never
    /// listed them, so nothing can linger in the sink unaccounted for.
    pub fn stale(&self, current: &BTreeSet<SnapshotName>) -> Vec<SnapshotName> {
        let mut out: BTreeSet<&SnapshotName> = self.names.difference(current).collect();
        out.extend(self.keys.keys().filter(|n| !current.contains(*n)));
        out.into_iter().cloned().collect()
    }

    /// Forget `name`; returns the key the caller must delete from the sink.
    pub fn evict(&mut self, name: &str) -> Option<MetricKey> {
        self.names.remove(name);
        self.keys.remove(name)
    }

    /// Track `key` as the live series of its snapshot.
    ///
    /// Returns the previously tracked key when it differs (state change).
    pub fn record(&mut self, key: MetricKey) -> Option<MetricKey> {
        let prev = self.keys.insert(key.snapshot.clone(), key.clone());
        prev.filter(|p| *p != key)
    }

    /// Adopt `current` as the discovered set for the next cycle.
    pub fn advance(&mut self, current: BTreeSet<SnapshotName>) {
        self.names = current;
    }
}
