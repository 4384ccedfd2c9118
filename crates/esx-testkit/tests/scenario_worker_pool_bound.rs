//! At most `threads` status fetches are in flight at any time.

use std::sync::Arc;
use std::time::Duration;

use esx_testkit::{engine_with, FakeRepositoryClient, RecordingSink};

fn cluster(n: usize) -> FakeRepositoryClient {
    let client = FakeRepositoryClient::new("backups");
    for i in 0..n {
        client.put_snapshot(&format!("daily-{i:02}"), "SUCCESS", i as u64);
    }
    client
}

#[tokio::test]
async fn status_fetches_never_exceed_thread_count() -> anyhow::Result<()> {
    let client = Arc::new(cluster(9));
    client.set_fetch_delay(Duration::from_millis(20));
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 3);

    let report = engine.run_cycle().await?;

    assert_eq!(report.published.len(), 9);
    assert_eq!(client.max_in_flight(), 3);
    assert_eq!(client.status_requests().len(), 9);
    Ok(())
}

#[tokio::test]
async fn single_thread_processes_serially() -> anyhow::Result<()> {
    let client = Arc::new(cluster(4));
    client.set_fetch_delay(Duration::from_millis(5));
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 1);

    engine.run_cycle().await?;

    assert_eq!(client.max_in_flight(), 1);
    assert_eq!(sink.len(), 4);
    Ok(())
}

#[tokio::test]
async fn more_threads_than_snapshots_is_fine() -> anyhow::Result<()> {
    let client = Arc::new(cluster(2));
    client.set_fetch_delay(Duration::from_millis(5));
    let sink = Arc::new(RecordingSink::new());
    let engine = engine_with(&client, &sink, 16);

    let report = engine.run_cycle().await?;

    assert_eq!(report.published.len(), 2);
    assert!(client.max_in_flight() <= 2);
    Ok(())
}
