//! esx-client
//!
//! Read-only HTTP client for the snapshot APIs of an Elasticsearch-compatible
//! cluster. This crate owns the [`RepositoryClient`] contract and the reqwest
//! implementation. It does **not** publish metrics; the reconciliation engine
//! drives it and hands results to a sink.

pub mod repository;
mod wire;

pub use repository::{ClientError, RepositoryClient};

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use esx_schemas::{ClusterInfo, SnapshotName, SnapshotRecord};
use reqwest::Url;
use serde::de::DeserializeOwned;

/// Basic-auth credentials resolved from the environment at startup.
///
/// **The password is redacted in `Debug` output.**
#[derive(Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

/// Everything needed to build an [`ElasticsearchClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URLs of cluster nodes, e.g. `https://es-0:9200`. Used round-robin.
    pub endpoints: Vec<String>,
    pub repository: String,
    /// Extra PEM CA bundle trusted on top of the built-in roots.
    pub cacert: Option<PathBuf>,
    /// Skip certificate verification entirely.
    pub insecure: bool,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub basic_auth: Option<BasicAuth>,
}

impl ClientOptions {
    pub fn new(endpoints: Vec<String>, repository: impl Into<String>) -> Self {
        Self {
            endpoints,
            repository: repository.into(),
            cacert: None,
            insecure: false,
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(10),
            basic_auth: None,
        }
    }
}

/// reqwest-backed [`RepositoryClient`].
#[derive(Debug)]
pub struct ElasticsearchClient {
    http: reqwest::Client,
    endpoints: Vec<Url>,
    next: AtomicUsize,
    repository: String,
    basic_auth: Option<BasicAuth>,
}

impl ElasticsearchClient {
    pub fn new(opts: ClientOptions) -> Result<Self, ClientError> {
        if opts.repository.trim().is_empty() {
            return Err(ClientError::Config("repository must not be empty".to_string()));
        }
        if opts.endpoints.is_empty() {
            return Err(ClientError::Config(
                "at least one endpoint is required".to_string(),
            ));
        }

        let mut endpoints = Vec::with_capacity(opts.endpoints.len());
        for raw in &opts.endpoints {
            let url = Url::parse(raw)
                .map_err(|e| ClientError::Config(format!("invalid endpoint {raw:?}: {e}")))?;
            if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
                return Err(ClientError::Config(format!(
                    "endpoint {raw:?} must be an http(s) base url"
                )));
            }
            endpoints.push(url);
        }

        let mut builder = reqwest::Client::builder()
            .connect_timeout(opts.connect_timeout)
            .timeout(opts.request_timeout)
            .pool_max_idle_per_host(10)
            .danger_accept_invalid_certs(opts.insecure);

        if let Some(path) = &opts.cacert {
            let pem = std::fs::read(path).map_err(|e| {
                ClientError::Config(format!("failed to read cacert {}: {e}", path.display()))
            })?;
            let certs = reqwest::Certificate::from_pem_bundle(&pem).map_err(|e| {
                ClientError::Config(format!("invalid cacert {}: {e}", path.display()))
            })?;
            if certs.is_empty() {
                tracing::error!(
                    cacert = %path.display(),
                    "no certs appended, using built-in roots only"
                );
            }
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }

        let http = builder
            .build()
            .map_err(|e| ClientError::Config(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            endpoints,
            next: AtomicUsize::new(0),
            repository: opts.repository,
            basic_auth: opts.basic_auth,
        })
    }

    /// Next endpoint in round-robin order.
    fn endpoint(&self) -> &Url {
        let i = self.next.fetch_add(1, Ordering::Relaxed) % self.endpoints.len();
        &self.endpoints[i]
    }

    /// Build `<endpoint>/<segments...>`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.endpoint().clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config("endpoint cannot be a base url".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, ClientError> {
        let url = self.url(segments)?;
        let mut req = self.http.get(url.clone()).query(query);
        if let Some(auth) = &self.basic_auth {
            req = req.basic_auth(&auth.username, auth.password.as_deref());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("GET {}: {e}", url.path())))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("GET {} body: {e}", url.path())))?;

        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: wire::error_message(&body),
            });
        }

        serde_json::from_slice(&body)
            .map_err(|e| ClientError::Decode(format!("GET {}: {e}", url.path())))
    }
}

#[async_trait]
impl RepositoryClient for ElasticsearchClient {
    fn repository(&self) -> &str {
        &self.repository
    }

    async fn list_snapshots(&self) -> Result<Vec<SnapshotName>, ClientError> {
        let rows: Vec<wire::CatSnapshotRow> = self
            .get_json(&["_cat", "snapshots", &self.repository], &[("format", "json")])
            .await?;
        wire::snapshot_names(rows)
    }

    async fn get_snapshot_status(&self, name: &str) -> Result<SnapshotRecord, ClientError> {
        let body: wire::SnapshotStatusResponse = self
            .get_json(&["_snapshot", &self.repository, name, "_status"], &[])
            .await?;
        body.into_record(name)
    }

    async fn get_cluster_info(&self) -> Result<ClusterInfo, ClientError> {
        self.get_json(&[], &[]).await
    }
}

// -----------------
// Tests (no network)
// -----------------
