//! Startup wiring: config, credentials, cluster client, connectivity check.
//!
//! Every failure here is fatal to the process.

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use esx_client::{BasicAuth, ClientOptions, ElasticsearchClient, RepositoryClient};
use esx_config::{
    load_layered_yaml, report_unused_keys, resolve_secrets, ConfigOverrides, ExporterConfig,
    LoadedConfig, ResolvedSecrets, UnusedKeyPolicy,
};
use esx_schemas::ClusterInfo;
use tracing::{info, warn};

use crate::scheduler::parse_schedule;
use crate::state::{AppState, ExporterInfo};

/// Effective configuration plus the merged tree it came from.
#[derive(Debug)]
pub struct Bootstrap {
    pub loaded: LoadedConfig,
    pub config: ExporterConfig,
}

/// Merge config files, apply command-line overrides and validate.
///
/// Unused keys are logged; with `strict` they abort startup.
pub fn load_config(
    paths: &[PathBuf],
    overrides: ConfigOverrides,
    strict: bool,
) -> Result<Bootstrap> {
    let loaded = load_layered_yaml(paths).context("loading configuration")?;

    let policy = if strict {
        UnusedKeyPolicy::Fail
    } else {
        UnusedKeyPolicy::Warn
    };
    let unused = report_unused_keys(&loaded.config_json, policy)?;
    for key in &unused.unused_leaf_pointers {
        warn!(key = %key, "config key is not used by the exporter");
    }

    let mut config = loaded.exporter()?;
    config.apply_overrides(overrides);
    config.validate()?;
    parse_schedule(&config.exporter.schedule)?;

    Ok(Bootstrap { loaded, config })
}

pub fn client_options(config: &ExporterConfig, secrets: &ResolvedSecrets) -> ClientOptions {
    let es = &config.elasticsearch;
    let mut opts = ClientOptions::new(es.endpoints.clone(), es.repository.clone());
    opts.cacert = es.cacert.clone();
    opts.insecure = es.insecure;
    opts.connect_timeout = config.connect_timeout();
    opts.request_timeout = config.request_timeout();
    opts.basic_auth = secrets.basic_auth().map(|(user, pass)| BasicAuth {
        username: user.to_string(),
        password: pass.map(str::to_string),
    });
    opts
}

/// Resolve credentials from the environment and build the HTTP client.
pub fn build_client(config: &ExporterConfig) -> Result<Arc<dyn RepositoryClient>> {
    let secrets = resolve_secrets(config)?;
    if config.elasticsearch.insecure {
        warn!("TLS certificate verification is disabled");
    }
    let client = ElasticsearchClient::new(client_options(config, &secrets))
        .context("building elasticsearch client")?;
    Ok(Arc::new(client))
}

/// One `GET /` against the cluster before anything is scheduled.
pub async fn startup_check(client: &dyn RepositoryClient) -> Result<ClusterInfo> {
    let cluster = client
        .get_cluster_info()
        .await
        .context("STARTUP_CHECK_FAILED: cluster is unreachable or rejected the request")?;
    info!(
        cluster = %cluster.cluster_name,
        node = %cluster.name,
        version = %cluster.version.number,
        repository = %client.repository(),
        "connected to elasticsearch"
    );
    Ok(cluster)
}

/// Startup check, then shared state around `client`.
pub async fn build_state(
    boot: &Bootstrap,
    client: Arc<dyn RepositoryClient>,
) -> Result<Arc<AppState>> {
    let cluster = startup_check(client.as_ref()).await?;
    let threads = NonZeroUsize::new(boot.config.exporter.threads)
        .context("exporter.threads must be at least 1")?;
    let info = ExporterInfo {
        metrics_path: boot.config.telemetry.path.clone(),
        schedule: boot.config.exporter.schedule.clone(),
        config_hash: boot.loaded.config_hash.clone(),
        cluster: Some(cluster),
    };
    let state = AppState::new(client, threads, info).context("registering metrics")?;
    Ok(Arc::new(state))
}
