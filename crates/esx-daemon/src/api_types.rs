//! Response bodies for the exporter's JSON endpoints.
//!
//! `Serialize + Deserialize` so handlers can encode them and tests can decode
//! them. No logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// GET /healthz

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

// GET /version

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionResponse {
    pub service: String,
    pub version: String,
    pub config_hash: String,
    pub repository: String,
    /// Cluster seen by the startup check.
    pub cluster_name: Option<String>,
    pub cluster_version: Option<String>,
}

// GET /v1/status

/// Summary of the most recent cycle that ran to completion or failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub finished_at: DateTime<Utc>,
    /// "success" | "failed"
    pub outcome: String,
    pub listed: usize,
    pub evicted: usize,
    pub replaced: usize,
    pub published: usize,
    pub fetch_failures: usize,
    pub series: usize,
    pub duration_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub repository: String,
    pub schedule: String,
    pub threads: usize,
    pub cycle_running: bool,
    pub uptime_secs: u64,
    pub last_cycle: Option<CycleSummary>,
}
