//! Label derivation.
//!
//! Pure and total over any decoded [`SnapshotRecord`]; malformed cluster
//! responses never reach this point (the client rejects them as decode errors).

use esx_schemas::SnapshotRecord;

use crate::MetricKey;

/// Map a snapshot record to the key of its size series.
pub fn derive_key(record: &SnapshotRecord) -> MetricKey {
    MetricKey {
        repository: record.repository.clone(),
        state: record.state.as_str().to_string(),
        snapshot: record.name.clone(),
        prefix: snapshot_prefix(&record.name).to_string(),
    }
}

/// Substring before the first `-`, or the whole name when there is none.
pub fn snapshot_prefix(name: &str) -> &str {
    name.split('-').next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use esx_schemas::SnapshotState;

    fn record(name: &str, state: &str) -> SnapshotRecord {
        SnapshotRecord {
            name: name.to_string(),
            repository: "backups".to_string(),
            state: SnapshotState::new(state),
            total_size_bytes: 1,
        }
    }

    #[test]
    fn prefix_is_text_before_first_dash() {
        assert_eq!(snapshot_prefix("daily-2024-01-01"), "daily");
    }

    #[test]
    fn prefix_without_dash_is_whole_name() {
        assert_eq!(snapshot_prefix("nightly"), "nightly");
    }

    #[test]
    fn leading_dash_gives_empty_prefix() {
        assert_eq!(snapshot_prefix("-orphan"), "");
    }

    #[test]
    fn derive_key_carries_all_labels() {
        let key = derive_key(&record("weekly-07", "PARTIAL"));
        assert_eq!(key.repository, "backups");
        assert_eq!(key.state, "PARTIAL");
        assert_eq!(key.snapshot, "weekly-07");
        assert_eq!(key.prefix, "weekly");
        assert_eq!(
            key.label_values(),
            ["backups", "PARTIAL", "weekly-07", "weekly"]
        );
    }

    #[test]
    fn same_name_different_state_is_a_different_key() {
        let a = derive_key(&record("daily-1", "IN_PROGRESS"));
        let b = derive_key(&record("daily-1", "SUCCESS"));
        assert_ne!(a, b);
        assert_eq!(a.snapshot, b.snapshot);
    }
}
