use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:9200";
pub const DEFAULT_THREADS: usize = 4;
pub const DEFAULT_SCHEDULE: &str = "0 */5 * * * *";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:9141";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Paths served by the daemon itself; the metrics path may not shadow them.
const RESERVED_PATHS: &[&str] = &["/", "/healthz", "/version", "/v1/status"];

/// Typed exporter configuration. Missing keys take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    pub elasticsearch: ElasticsearchSection,
    pub exporter: ExporterSection,
    pub telemetry: TelemetrySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElasticsearchSection {
    /// Base URLs, used round-robin.
    pub endpoints: Vec<String>,
    pub repository: String,
    /// Extra PEM CA bundle trusted on top of the system roots.
    pub cacert: Option<PathBuf>,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub auth: AuthEnvNames,
}

impl Default for ElasticsearchSection {
    fn default() -> Self {
        Self {
            endpoints: vec![DEFAULT_ENDPOINT.to_string()],
            repository: String::new(),
            cacert: None,
            insecure: false,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 10_000,
            auth: AuthEnvNames::default(),
        }
    }
}

/// Names of environment variables holding basic-auth credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEnvNames {
    pub username_env: Option<String>,
    pub password_env: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExporterSection {
    /// Concurrent status fetches per cycle.
    pub threads: usize,
    /// Cron expression, five or six fields.
    pub schedule: String,
}

impl Default for ExporterSection {
    fn default() -> Self {
        Self {
            threads: DEFAULT_THREADS,
            schedule: DEFAULT_SCHEDULE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub listen_addr: String,
    pub path: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

/// Command-line values that take precedence over the config files.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub repository: Option<String>,
    /// Replaces the configured list when non-empty.
    pub endpoints: Vec<String>,
    pub threads: Option<usize>,
    pub schedule: Option<String>,
    pub cacert: Option<PathBuf>,
    /// Only ever turns verification off.
    pub insecure: bool,
    pub listen_addr: Option<String>,
    pub metrics_path: Option<String>,
}

impl ExporterConfig {
    pub fn from_json(config_json: &Value) -> Result<Self> {
        serde_json::from_value(config_json.clone()).context("config does not match exporter schema")
    }

    pub fn apply_overrides(&mut self, o: ConfigOverrides) {
        if let Some(repository) = o.repository {
            self.elasticsearch.repository = repository;
        }
        if !o.endpoints.is_empty() {
            self.elasticsearch.endpoints = o.endpoints;
        }
        if let Some(threads) = o.threads {
            self.exporter.threads = threads;
        }
        if let Some(schedule) = o.schedule {
            self.exporter.schedule = schedule;
        }
        if o.cacert.is_some() {
            self.elasticsearch.cacert = o.cacert;
        }
        if o.insecure {
            self.elasticsearch.insecure = true;
        }
        if let Some(addr) = o.listen_addr {
            self.telemetry.listen_addr = addr;
        }
        if let Some(path) = o.metrics_path {
            self.telemetry.path = path;
        }
    }

    /// Reject configurations the exporter cannot start with.
    pub fn validate(&self) -> Result<()> {
        let es = &self.elasticsearch;
        if es.repository.trim().is_empty() {
            bail!("CONFIG_INVALID: elasticsearch.repository must be set");
        }
        if es.endpoints.is_empty() {
            bail!("CONFIG_INVALID: elasticsearch.endpoints must list at least one URL");
        }
        for ep in &es.endpoints {
            if !(ep.starts_with("http://") || ep.starts_with("https://")) {
                bail!("CONFIG_INVALID: endpoint '{ep}' must start with http:// or https://");
            }
        }
        if es.connect_timeout_ms == 0 || es.request_timeout_ms == 0 {
            bail!("CONFIG_INVALID: elasticsearch timeouts must be greater than zero");
        }
        if self.exporter.threads == 0 {
            bail!("CONFIG_INVALID: exporter.threads must be at least 1");
        }
        if self.exporter.schedule.trim().is_empty() {
            bail!("CONFIG_INVALID: exporter.schedule must not be empty");
        }
        if !self.telemetry.path.starts_with('/') {
            bail!(
                "CONFIG_INVALID: telemetry.path '{}' must start with '/'",
                self.telemetry.path
            );
        }
        if RESERVED_PATHS.contains(&self.telemetry.path.as_str()) {
            bail!(
                "CONFIG_INVALID: telemetry.path '{}' collides with a built-in route",
                self.telemetry.path
            );
        }
        self.listen_socket_addr()?;
        Ok(())
    }

    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        self.telemetry
            .listen_addr
            .parse::<SocketAddr>()
            .with_context(|| {
                format!(
                    "CONFIG_INVALID: bad listen address '{}'",
                    self.telemetry.listen_addr
                )
            })
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.elasticsearch.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.elasticsearch.request_timeout_ms)
    }
}
