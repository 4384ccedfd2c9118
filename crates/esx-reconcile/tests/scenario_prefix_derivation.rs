//! Label derivation: prefix is the name up to the first '-'.

use esx_reconcile::*;
use esx_schemas::{SnapshotRecord, SnapshotState};

fn record(name: &str) -> SnapshotRecord {
    SnapshotRecord {
        name: name.to_string(),
        repository: "s3-backups".to_string(),
        state: SnapshotState::new("SUCCESS"),
        total_size_bytes: 2048,
    }
}

#[test]
fn scenario_prefix_derivation_dated_snapshot_uses_leading_segment() {
    let key = derive_key(&record("daily-2024-01-01"));
    assert_eq!(key.prefix, "daily");
    assert_eq!(key.snapshot, "daily-2024-01-01");
    assert_eq!(key.repository, "s3-backups");
}

#[test]
fn scenario_prefix_derivation_name_without_separator_is_its_own_prefix() {
    let key = derive_key(&record("nightly"));
    assert_eq!(key.prefix, "nightly");
}

#[test]
fn scenario_prefix_derivation_label_order_matches_gauge_labels() {
    let key = derive_key(&record("weekly-1"));
    let pairs: Vec<(&str, &str)> = LABEL_NAMES
        .iter()
        .copied()
        .zip(key.label_values())
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("repository", "s3-backups"),
            ("state", "SUCCESS"),
            ("snapshot", "weekly-1"),
            ("prefix", "weekly"),
        ]
    );
}
