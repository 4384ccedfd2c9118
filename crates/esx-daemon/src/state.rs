//! Shared runtime state for the exporter daemon.
//!
//! Handlers receive `State<Arc<AppState>>`; the scheduler holds the same Arc.

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use esx_client::RepositoryClient;
use esx_reconcile::{CycleError, CycleReport, ReconcileEngine};
use esx_schemas::ClusterInfo;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::api_types::CycleSummary;
use crate::metrics::{ExporterMetrics, SinkError};

/// Static build metadata included in `/version`.
#[derive(Clone, Debug)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

/// Values fixed at startup and echoed by the HTTP surface.
#[derive(Clone, Debug, Default)]
pub struct ExporterInfo {
    pub metrics_path: String,
    pub schedule: String,
    pub config_hash: String,
    /// Result of the startup connectivity check.
    pub cluster: Option<ClusterInfo>,
}

pub struct AppState {
    pub build: BuildInfo,
    pub info: ExporterInfo,
    pub metrics: ExporterMetrics,
    pub engine: ReconcileEngine,
    pub last_cycle: RwLock<Option<CycleSummary>>,
}

impl AppState {
    /// Wire a fresh registry and an engine writing into it.
    pub fn new(
        client: Arc<dyn RepositoryClient>,
        threads: NonZeroUsize,
        info: ExporterInfo,
    ) -> Result<Self, SinkError> {
        let metrics = ExporterMetrics::new()?;
        let engine = ReconcileEngine::new(client, Arc::new(metrics.snapshot_sink()), threads);
        Ok(Self {
            build: BuildInfo {
                service: "esx-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            info,
            metrics,
            engine,
            last_cycle: RwLock::new(None),
        })
    }

    /// Run one cycle and record its outcome in metrics and `last_cycle`.
    ///
    /// A skipped cycle only bumps the skip counter; the cycle that is still
    /// running records its own summary.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let result = self.engine.run_cycle().await;
        match &result {
            Ok(report) => {
                self.metrics.observe_report(report);
                *self.last_cycle.write().await = Some(summary_of(report));
                if !report.is_clean() {
                    info!(
                        failed = report.failures.len(),
                        "cycle finished with fetch failures; retrying on next tick"
                    );
                }
            }
            Err(CycleError::AlreadyRunning) => {
                self.metrics.observe_error(&CycleError::AlreadyRunning);
                warn!(
                    repository = %self.engine.repository(),
                    "previous cycle still running; skipping this tick"
                );
            }
            Err(err) => {
                self.metrics.observe_error(err);
                error!(repository = %self.engine.repository(), error = %err, "cycle failed");
                let mut last = self.last_cycle.write().await;
                // A failed listing leaves the sink as the last completed cycle left it.
                let series = last.as_ref().map_or(0, |prev| prev.series);
                *last = Some(CycleSummary {
                    finished_at: Utc::now(),
                    outcome: "failed".to_string(),
                    listed: 0,
                    evicted: 0,
                    replaced: 0,
                    published: 0,
                    fetch_failures: 0,
                    series,
                    duration_ms: 0,
                    error: Some(err.to_string()),
                });
            }
        }
        result
    }
}

fn summary_of(report: &CycleReport) -> CycleSummary {
    CycleSummary {
        finished_at: Utc::now(),
        outcome: "success".to_string(),
        listed: report.listed,
        evicted: report.evicted.len(),
        replaced: report.replaced.len(),
        published: report.published.len(),
        fetch_failures: report.failures.len(),
        series: report.series,
        duration_ms: report.duration.as_millis() as u64,
        error: report
            .failures
            .first()
            .map(|f| format!("{}: {}", f.snapshot, f.error)),
    }
}

/// Seconds since the first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
