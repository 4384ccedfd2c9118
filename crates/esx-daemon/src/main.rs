//! esx-daemon entry point.
//!
//! Parses flags, loads configuration, checks the cluster, then either serves
//! metrics on a schedule or runs a single cycle. Handlers live in `routes.rs`;
//! startup wiring lives in `bootstrap.rs`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use esx_config::ConfigOverrides;
use esx_daemon::{bootstrap, routes, scheduler, state::AppState};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "esx-daemon")]
#[command(about = "Exports Elasticsearch snapshot sizes as Prometheus metrics", long_about = None)]
struct Cli {
    #[command(flatten)]
    flags: Flags,

    #[command(subcommand)]
    cmd: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the cluster, then serve metrics and run cycles on the schedule (default)
    Serve,

    /// Check the cluster, run one cycle and print the exposition
    Once,

    /// Print the layered config hash and canonical JSON
    ConfigHash,
}

#[derive(Args)]
struct Flags {
    /// Config files in merge order (later wins)
    #[arg(long = "config", global = true)]
    config_paths: Vec<PathBuf>,

    /// Snapshot repository to export
    #[arg(long, global = true)]
    repository: Option<String>,

    /// Cluster base URL; repeat for round-robin across nodes
    #[arg(long = "endpoint", global = true)]
    endpoints: Vec<String>,

    /// Concurrent status fetches per cycle
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Cron expression (5 or 6 fields)
    #[arg(long, global = true)]
    schedule: Option<String>,

    /// Extra PEM CA bundle to trust
    #[arg(long, global = true)]
    cacert: Option<PathBuf>,

    /// Skip TLS certificate verification
    #[arg(long, default_value_t = false, global = true)]
    insecure: bool,

    /// Address for the metrics server, e.g. 0.0.0.0:9141
    #[arg(long, global = true)]
    listen_addr: Option<String>,

    /// Path serving the Prometheus exposition
    #[arg(long, global = true)]
    metrics_path: Option<String>,

    /// Fail startup on config keys the exporter does not read
    #[arg(long, default_value_t = false, global = true)]
    strict_config: bool,
}

impl Flags {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            repository: self.repository.clone(),
            endpoints: self.endpoints.clone(),
            threads: self.threads,
            schedule: self.schedule.clone(),
            cacert: self.cacert.clone(),
            insecure: self.insecure,
            listen_addr: self.listen_addr.clone(),
            metrics_path: self.metrics_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience); production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    if let Some(Commands::ConfigHash) = cli.cmd {
        let loaded = esx_config::load_layered_yaml(&cli.flags.config_paths)?;
        println!("config_hash={}", loaded.config_hash);
        println!("{}", serde_json::to_string_pretty(&loaded.config_json)?);
        return Ok(());
    }

    let boot = bootstrap::load_config(
        &cli.flags.config_paths,
        cli.flags.overrides(),
        cli.flags.strict_config,
    )?;
    info!(
        config_hash = %boot.loaded.config_hash,
        repository = %boot.config.elasticsearch.repository,
        threads = boot.config.exporter.threads,
        schedule = %boot.config.exporter.schedule,
        "configuration loaded"
    );

    let client = bootstrap::build_client(&boot.config)?;
    let state = bootstrap::build_state(&boot, client).await?;

    match cli.cmd.unwrap_or(Commands::Serve) {
        Commands::Once => run_once(&state).await,
        _ => serve(state, &boot).await,
    }
}

async fn run_once(state: &AppState) -> Result<()> {
    let report = state.run_cycle().await.context("cycle failed")?;
    print!("{}", state.metrics.render()?);
    info!(
        published = report.published.len(),
        failed = report.failures.len(),
        "single cycle finished"
    );
    Ok(())
}

async fn serve(state: Arc<AppState>, boot: &bootstrap::Bootstrap) -> Result<()> {
    let schedule = scheduler::parse_schedule(&boot.config.exporter.schedule)?;
    let addr = boot.config.listen_socket_addr()?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    let ticker = scheduler::spawn_scheduler(Arc::clone(&state), schedule);

    let app = routes::build_router(Arc::clone(&state)).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::DEBUG))
            .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
    );

    info!(
        "esx-daemon listening on http://{}{}",
        addr, boot.config.telemetry.path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    ticker.abort();
    info!("esx-daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
