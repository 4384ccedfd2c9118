//! Series follow the listing: a name that leaves the repository loses its
//! series, and evictions land before any new value is written.

use std::sync::Arc;

use esx_testkit::{engine_with, FakeRepositoryClient, RecordingSink, SinkOp};

#[tokio::test]
async fn snapshot_removed_from_repository_loses_its_series() -> anyhow::Result<()> {
    let client = Arc::new(
        FakeRepositoryClient::new("backups")
            .with_snapshot("a-1", "SUCCESS", 100)
            .with_snapshot("b-1", "SUCCESS", 200),
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 2);

    engine.run_cycle().await?;
    assert_eq!(sink.snapshots(), vec!["a-1", "b-1"]);

    client.remove_snapshot("a-1");
    client.put_snapshot("c-1", "SUCCESS", 300);
    client.put_snapshot("b-1", "SUCCESS", 250);
    sink.clear_ops();
    let report = engine.run_cycle().await?;

    // a-1 deleted, b-1 refreshed, c-1 created, nothing else.
    let ops = sink.ops();
    assert_eq!(ops.len(), 3, "{ops:?}");
    assert_eq!(ops[0], SinkOp::Delete(report.evicted[0].clone()));
    assert_eq!(sink.values_for("b-1"), vec![("SUCCESS".to_string(), 250.0)]);
    assert_eq!(sink.values_for("c-1"), vec![("SUCCESS".to_string(), 300.0)]);
    assert_eq!(report.evicted.len(), 1);
    assert_eq!(report.evicted[0].snapshot, "a-1");
    assert_eq!(sink.snapshots(), vec!["b-1", "c-1"]);
    assert_eq!(engine.published().await.names().len(), 2);
    Ok(())
}

#[tokio::test]
async fn evictions_are_applied_before_any_new_value_is_written() -> anyhow::Result<()> {
    let client = Arc::new(
        FakeRepositoryClient::new("backups")
            .with_snapshot("a-1", "SUCCESS", 1)
            .with_snapshot("b-1", "SUCCESS", 2),
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 4);
    engine.run_cycle().await?;

    client.remove_snapshot("a-1");
    client.remove_snapshot("b-1");
    client.put_snapshot("c-1", "SUCCESS", 3);
    client.put_snapshot("d-1", "SUCCESS", 4);
    sink.clear_ops();
    engine.run_cycle().await?;

    let ops = sink.ops();
    let first_set = ops
        .iter()
        .position(|op| matches!(op, SinkOp::Set(..)))
        .expect("cycle wrote values");
    let last_delete = ops
        .iter()
        .rposition(SinkOp::is_delete)
        .expect("cycle evicted series");
    assert!(last_delete < first_set, "ops out of order: {ops:?}");
    assert_eq!(ops.iter().filter(|op| op.is_delete()).count(), 2);
    Ok(())
}

#[tokio::test]
async fn empty_listing_retires_every_series() -> anyhow::Result<()> {
    let client = Arc::new(
        FakeRepositoryClient::new("backups")
            .with_snapshot("a-1", "SUCCESS", 1)
            .with_snapshot("b-1", "FAILED", 2),
    );
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 2);
    engine.run_cycle().await?;
    assert_eq!(sink.len(), 2);

    client.remove_snapshot("a-1");
    client.remove_snapshot("b-1");
    let report = engine.run_cycle().await?;

    assert_eq!(report.listed, 0);
    assert_eq!(report.evicted.len(), 2);
    assert!(report.published.is_empty());
    assert!(sink.is_empty());
    assert_eq!(report.series, 0);
    Ok(())
}
