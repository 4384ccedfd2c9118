//! Prometheus registry for the exporter.
//!
//! Holds the snapshot size gauge written by the reconcile engine and the
//! exporter's own cycle metrics. Everything is registered in one private
//! [`Registry`] so tests never collide on the global default registry.

use std::fmt;

use esx_reconcile::{CycleError, CycleReport, MetricKey, MetricSink, LABEL_NAMES};
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

pub const SNAPSHOT_SIZE_METRIC: &str = "elasticsearch_snapshot_stats_size_in_bytes_total";
const SNAPSHOT_SIZE_HELP: &str = "Total size of files that are referenced by the snapshot";

#[derive(Debug)]
pub enum SinkError {
    Register(prometheus::Error),
    Encode(String),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Register(e) => write!(f, "metric registration failed: {e}"),
            SinkError::Encode(msg) => write!(f, "metric encoding failed: {msg}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SinkError::Register(e) => Some(e),
            SinkError::Encode(_) => None,
        }
    }
}

impl From<prometheus::Error> for SinkError {
    fn from(e: prometheus::Error) -> Self {
        SinkError::Register(e)
    }
}

/// [`MetricSink`] over the snapshot size gauge.
///
/// `GaugeVec` is internally synchronised, so workers write concurrently.
#[derive(Clone)]
pub struct PrometheusSink {
    gauge: GaugeVec,
}

impl MetricSink for PrometheusSink {
    fn set(&self, key: &MetricKey, value: f64) {
        self.gauge.with_label_values(&key.label_values()).set(value);
    }

    fn delete(&self, key: &MetricKey) -> bool {
        self.gauge.remove_label_values(&key.label_values()).is_ok()
    }
}

pub struct ExporterMetrics {
    registry: Registry,
    snapshot_size: GaugeVec,
    cycles: IntCounterVec,
    fetch_errors: IntCounter,
    last_cycle_duration: Gauge,
    published_series: IntGauge,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self, SinkError> {
        let registry = Registry::new();

        let snapshot_size = GaugeVec::new(
            Opts::new(SNAPSHOT_SIZE_METRIC, SNAPSHOT_SIZE_HELP),
            &LABEL_NAMES,
        )?;
        let cycles = IntCounterVec::new(
            Opts::new(
                "elasticsearch_snapshot_exporter_cycles_total",
                "Reconcile cycles by outcome (success, failed, skipped)",
            ),
            &["outcome"],
        )?;
        let fetch_errors = IntCounter::new(
            "elasticsearch_snapshot_exporter_fetch_errors_total",
            "Snapshot status fetches that failed",
        )?;
        let last_cycle_duration = Gauge::new(
            "elasticsearch_snapshot_exporter_last_cycle_duration_seconds",
            "Wall time of the last completed cycle",
        )?;
        let published_series = IntGauge::new(
            "elasticsearch_snapshot_exporter_published_series",
            "Snapshot size series currently exposed",
        )?;

        registry.register(Box::new(snapshot_size.clone()))?;
        registry.register(Box::new(cycles.clone()))?;
        registry.register(Box::new(fetch_errors.clone()))?;
        registry.register(Box::new(last_cycle_duration.clone()))?;
        registry.register(Box::new(published_series.clone()))?;

        // Pre-create the outcome series so they export as 0 before the first cycle.
        for outcome in ["success", "failed", "skipped"] {
            cycles.with_label_values(&[outcome]);
        }

        Ok(Self {
            registry,
            snapshot_size,
            cycles,
            fetch_errors,
            last_cycle_duration,
            published_series,
        })
    }

    /// Sink handle for the reconcile engine. Shares the registered gauge.
    pub fn snapshot_sink(&self) -> PrometheusSink {
        PrometheusSink {
            gauge: self.snapshot_size.clone(),
        }
    }

    pub fn observe_report(&self, report: &CycleReport) {
        self.cycles.with_label_values(&["success"]).inc();
        self.fetch_errors.inc_by(report.failures.len() as u64);
        self.last_cycle_duration.set(report.duration.as_secs_f64());
        self.published_series.set(report.series as i64);
    }

    pub fn observe_error(&self, err: &CycleError) {
        let outcome = if err.is_skip() { "skipped" } else { "failed" };
        self.cycles.with_label_values(&[outcome]).inc();
    }

    pub fn cycles(&self, outcome: &str) -> u64 {
        self.cycles.with_label_values(&[outcome]).get()
    }

    pub fn fetch_errors(&self) -> u64 {
        self.fetch_errors.get()
    }

    /// Text exposition of every registered family.
    pub fn render(&self) -> Result<String, SinkError> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| SinkError::Encode(e.to_string()))
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
