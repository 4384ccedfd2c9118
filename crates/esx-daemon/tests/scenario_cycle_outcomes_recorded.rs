//! Cycle outcomes land in the exporter's own metrics and in `/v1/status`
//! state; listing failures keep the published series.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use esx_client::ClientError;
use esx_daemon::metrics::SNAPSHOT_SIZE_METRIC;
use esx_daemon::state::{AppState, ExporterInfo};
use esx_reconcile::CycleError;
use esx_testkit::FakeRepositoryClient;

fn make_state(client: &Arc<FakeRepositoryClient>) -> Arc<AppState> {
    let info = ExporterInfo {
        metrics_path: "/metrics".to_string(),
        ..ExporterInfo::default()
    };
    Arc::new(AppState::new(client.clone(), NonZeroUsize::new(2).unwrap(), info).unwrap())
}

#[tokio::test]
async fn item_failures_count_as_fetch_errors_not_failed_cycles() {
    let client = Arc::new(
        FakeRepositoryClient::new("backups")
            .with_snapshot("a-1", "SUCCESS", 1)
            .with_snapshot("b-1", "SUCCESS", 2),
    );
    client.fail_status_for("b-1");
    let st = make_state(&client);

    st.run_cycle().await.unwrap();

    assert_eq!(st.metrics.cycles("success"), 1);
    assert_eq!(st.metrics.cycles("failed"), 0);
    assert_eq!(st.metrics.fetch_errors(), 1);
}

#[tokio::test]
async fn listing_failure_is_a_failed_cycle_and_keeps_series() {
    let client = Arc::new(FakeRepositoryClient::new("backups").with_snapshot("a-1", "SUCCESS", 7));
    let st = make_state(&client);
    st.run_cycle().await.unwrap();

    client.fail_listing(ClientError::Api {
        status: 503,
        message: "cluster_block_exception".to_string(),
    });
    let err = st.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::Discovery(_)));
    assert_eq!(st.metrics.cycles("failed"), 1);
    let text = st.metrics.render().unwrap();
    assert!(
        text.lines()
            .any(|l| l.starts_with(SNAPSHOT_SIZE_METRIC) && l.contains(r#"snapshot="a-1""#)),
        "{text}"
    );

    let last = st.last_cycle.read().await.clone().unwrap();
    assert_eq!(last.outcome, "failed");
    assert_eq!(last.series, 1);
    assert!(last.error.unwrap().contains("cluster_block_exception"));
}

#[tokio::test]
async fn overlapping_tick_is_counted_as_skipped() {
    let client = Arc::new(FakeRepositoryClient::new("backups").with_snapshot("a-1", "SUCCESS", 1));
    let st = make_state(&client);

    client.block_listing();
    let first = {
        let st = Arc::clone(&st);
        tokio::spawn(async move { st.run_cycle().await })
    };
    for _ in 0..200 {
        if client.list_calls() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = st.run_cycle().await.unwrap_err();
    assert!(err.is_skip());
    assert_eq!(st.metrics.cycles("skipped"), 1);
    assert!(st.last_cycle.read().await.is_none(), "skip must not overwrite the summary");

    client.release_listing();
    first.await.unwrap().unwrap();
    assert_eq!(st.metrics.cycles("success"), 1);
    assert_eq!(st.last_cycle.read().await.as_ref().unwrap().outcome, "success");
}

#[tokio::test]
async fn failure_summary_carries_series_from_last_completed_cycle() {
    let client = Arc::new(
        FakeRepositoryClient::new("backups")
            .with_snapshot("a-1", "SUCCESS", 1)
            .with_snapshot("b-1", "SUCCESS", 2),
    );
    let st = make_state(&client);
    client.fail_listing(ClientError::Api {
        status: 503,
        message: "unavailable".to_string(),
    });

    st.run_cycle().await.unwrap_err();
    assert_eq!(st.last_cycle.read().await.as_ref().unwrap().series, 0);

    client.restore_listing();
    st.run_cycle().await.unwrap();
    client.fail_listing(ClientError::Api {
        status: 503,
        message: "unavailable".to_string(),
    });
    st.run_cycle().await.unwrap_err();

    let last = st.last_cycle.read().await.clone().unwrap();
    assert_eq!(last.outcome, "failed");
    assert_eq!(last.series, 2);
}
